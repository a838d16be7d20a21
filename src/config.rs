//! Daemon configuration
//!
//! Loaded from TOML with per-field defaults; every field can be omitted.
//! Command templates keep the daemons' fixed argument shapes in one place,
//! with `{iface}` and `{conf}` as the only variables.

use crate::error::{WifiMgrError, WifiMgrResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main wifimgr configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiMgrConfig {
    /// Wireless interface to arbitrate
    #[serde(default = "default_interface")]
    pub interface: String,
    /// wpa_supplicant conf holding the known networks
    #[serde(default = "default_wpa_conf_path")]
    pub wpa_conf_path: PathBuf,
    /// Arbitration tick period
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Sustained known-network absence required before entering hotspot mode
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    /// Connectivity test deadline (seconds)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Connectivity test poll interval
    #[serde(default = "default_connect_poll_ms")]
    pub connect_poll_ms: u64,
    /// Hotspot addressing
    #[serde(default)]
    pub hotspot: HotspotSettings,
    /// Daemon command templates
    #[serde(default)]
    pub commands: CommandTemplates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotSettings {
    /// Static address the interface takes in hotspot mode
    #[serde(default = "default_hotspot_address")]
    pub address: String,
    #[serde(default = "default_hotspot_prefix_len")]
    pub prefix_len: u8,
    #[serde(default = "default_dhcp_range_start")]
    pub dhcp_range_start: String,
    #[serde(default = "default_dhcp_range_end")]
    pub dhcp_range_end: String,
    #[serde(default = "default_dhcp_lease_time")]
    pub dhcp_lease_time: String,
    /// hostapd configuration file passed to the access-point daemon
    #[serde(default = "default_hostapd_conf")]
    pub hostapd_conf: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandTemplates {
    /// Station daemon; `{iface}` and `{conf}` are substituted
    #[serde(default = "default_station_cmd")]
    pub station: String,
    /// Access-point daemon; `{conf}` is substituted
    #[serde(default = "default_access_point_cmd")]
    pub access_point: String,
    /// Address-server daemon; `{iface}` and `{conf}` are substituted
    #[serde(default = "default_address_server_cmd")]
    pub address_server: String,
}

impl CommandTemplates {
    /// Expand a template's placeholders
    pub fn expand(template: &str, interface: &str, conf: &Path) -> String {
        template
            .replace("{iface}", interface)
            .replace("{conf}", &conf.display().to_string())
    }
}

fn default_interface() -> String {
    "wlan0".to_string()
}

fn default_wpa_conf_path() -> PathBuf {
    PathBuf::from("/etc/wpa_supplicant/wpa_supplicant.conf")
}

fn default_tick_ms() -> u64 {
    3_000
}

fn default_grace_ms() -> u64 {
    10_000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_connect_poll_ms() -> u64 {
    1_000
}

fn default_hotspot_address() -> String {
    "10.11.12.1".to_string()
}

fn default_hotspot_prefix_len() -> u8 {
    24
}

fn default_dhcp_range_start() -> String {
    "10.11.12.10".to_string()
}

fn default_dhcp_range_end() -> String {
    "10.11.12.20".to_string()
}

fn default_dhcp_lease_time() -> String {
    "12h".to_string()
}

fn default_hostapd_conf() -> PathBuf {
    PathBuf::from("/etc/hostapd/hostapd.conf")
}

fn default_station_cmd() -> String {
    "/sbin/wpa_supplicant -Dnl80211 -i{iface} -c{conf}".to_string()
}

fn default_access_point_cmd() -> String {
    "/usr/sbin/hostapd {conf}".to_string()
}

fn default_address_server_cmd() -> String {
    "/usr/sbin/dnsmasq --no-resolv --bind-interfaces -i {iface} --dhcp-authoritative -d -C {conf}".to_string()
}

impl Default for HotspotSettings {
    fn default() -> Self {
        Self {
            address: default_hotspot_address(),
            prefix_len: default_hotspot_prefix_len(),
            dhcp_range_start: default_dhcp_range_start(),
            dhcp_range_end: default_dhcp_range_end(),
            dhcp_lease_time: default_dhcp_lease_time(),
            hostapd_conf: default_hostapd_conf(),
        }
    }
}

impl Default for CommandTemplates {
    fn default() -> Self {
        Self {
            station: default_station_cmd(),
            access_point: default_access_point_cmd(),
            address_server: default_address_server_cmd(),
        }
    }
}

impl Default for WifiMgrConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            wpa_conf_path: default_wpa_conf_path(),
            tick_ms: default_tick_ms(),
            grace_ms: default_grace_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            connect_poll_ms: default_connect_poll_ms(),
            hotspot: HotspotSettings::default(),
            commands: CommandTemplates::default(),
        }
    }
}

impl WifiMgrConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> WifiMgrResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| WifiMgrError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| WifiMgrError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_ms)
    }

    pub fn grace_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WifiMgrConfig::default();
        assert_eq!(config.interface, "wlan0");
        assert_eq!(config.tick_ms, 3_000);
        assert_eq!(config.grace_ms, 10_000);
        assert_eq!(config.hotspot.address, "10.11.12.1");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: WifiMgrConfig = toml::from_str(
            "interface = \"wlp2s0\"\n\n[hotspot]\naddress = \"192.168.1.1\"\n"
        ).unwrap();
        assert_eq!(config.interface, "wlp2s0");
        assert_eq!(config.hotspot.address, "192.168.1.1");
        // Unspecified fields keep their defaults
        assert_eq!(config.hotspot.dhcp_range_start, "10.11.12.10");
        assert_eq!(config.grace_ms, 10_000);
    }

    #[test]
    fn test_template_expansion() {
        let cmd = CommandTemplates::expand(
            &default_station_cmd(),
            "wlan0",
            Path::new("/etc/wpa_supplicant/wpa_supplicant.conf"),
        );
        assert_eq!(
            cmd,
            "/sbin/wpa_supplicant -Dnl80211 -iwlan0 -c/etc/wpa_supplicant/wpa_supplicant.conf"
        );
    }
}
