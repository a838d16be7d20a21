//! Hotspot-mode plumbing: generated dnsmasq configuration
//!
//! hostapd keeps its own static conf file; dnsmasq gets a throwaway conf
//! generated per hotspot session so the DHCP range always matches the
//! interface's static address. The temp file is deleted when the handle
//! drops, after the daemon has been stopped.

use crate::config::HotspotSettings;
use crate::error::{WifiMgrError, WifiMgrResult};
use crate::validation;
use std::io::Write;
use tempfile::NamedTempFile;

/// Render the dnsmasq configuration for one hotspot session
pub fn dnsmasq_conf(settings: &HotspotSettings, interface: &str) -> WifiMgrResult<String> {
    validation::validate_interface_name(interface)?;

    Ok(format!(
        "no-resolv\n\
         bind-interfaces\n\
         interface={}\n\
         dhcp-authoritative\n\
         dhcp-range={},{},{}\n",
        interface,
        settings.dhcp_range_start,
        settings.dhcp_range_end,
        settings.dhcp_lease_time,
    ))
}

/// Write the dnsmasq conf to a temp file that lives as long as the handle
pub fn write_dnsmasq_conf(
    settings: &HotspotSettings,
    interface: &str,
) -> WifiMgrResult<NamedTempFile> {
    let conf = dnsmasq_conf(settings, interface)?;

    let mut file = tempfile::Builder::new()
        .prefix("dnsmasq-")
        .suffix(".conf")
        .tempfile()
        .map_err(|e| WifiMgrError::Config(format!("Failed to create dnsmasq conf: {}", e)))?;

    file.write_all(conf.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dnsmasq_conf_contents() {
        let conf = dnsmasq_conf(&HotspotSettings::default(), "wlan0").unwrap();
        assert!(conf.contains("no-resolv\n"));
        assert!(conf.contains("bind-interfaces\n"));
        assert!(conf.contains("interface=wlan0\n"));
        assert!(conf.contains("dhcp-authoritative\n"));
        assert!(conf.contains("dhcp-range=10.11.12.10,10.11.12.20,12h\n"));
    }

    #[test]
    fn test_dnsmasq_conf_rejects_bad_interface() {
        assert!(dnsmasq_conf(&HotspotSettings::default(), "wlan0; reboot").is_err());
    }

    #[test]
    fn test_written_conf_round_trips() {
        let file = write_dnsmasq_conf(&HotspotSettings::default(), "wlan1").unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("interface=wlan1"));
    }
}
