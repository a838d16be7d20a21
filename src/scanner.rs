//! WiFi scanning and association queries
//!
//! The `WifiScanner` capability trait is what the arbiter sees; `IwScanner`
//! implements it with iw(8), iwgetid(8) and sysfs. Tests inject a fake.

use crate::error::{WifiMgrError, WifiMgrResult};
use crate::validation;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

/// Platform access the mode arbiter needs: visible SSIDs, wireless
/// interfaces present on the host, and the currently associated SSID.
#[async_trait]
pub trait WifiScanner: Send + Sync {
    /// List wireless-capable interfaces
    async fn wifi_interfaces(&self) -> WifiMgrResult<Vec<String>>;

    /// SSIDs visible on one interface right now, in observed order.
    /// The result is ephemeral and never persisted.
    async fn scan(&self, interface: &str) -> WifiMgrResult<Vec<String>>;

    /// SSID the interface is currently associated with, if any
    async fn current_ssid(&self, interface: &str) -> WifiMgrResult<Option<String>>;
}

/// Scanner backed by the iw/iwgetid command-line tools
pub struct IwScanner {
}

impl IwScanner {
    pub fn new() -> Self {
        Self {}
    }

    async fn run_iw(&self, args: &[&str]) -> WifiMgrResult<String> {
        let output = Command::new("iw")
            .args(args)
            .output()
            .await
            .map_err(|e| WifiMgrError::Scan(format!("iw {}: {}", args.join(" "), e)))?;

        if !output.status.success() {
            return Err(WifiMgrError::Scan(format!(
                "iw {} exited with {:?}: {}",
                args.join(" "),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Extract SSID lines from `iw dev <iface> scan` output
fn parse_scan_output(output: &str) -> Vec<String> {
    let mut ssids = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if let Some(ssid) = line.strip_prefix("SSID: ") {
            // Hidden networks show up with an empty SSID
            if !ssid.is_empty() && !ssids.iter().any(|s| s == ssid) {
                ssids.push(ssid.to_string());
            }
        }
    }

    ssids
}

#[async_trait]
impl WifiScanner for IwScanner {
    async fn wifi_interfaces(&self) -> WifiMgrResult<Vec<String>> {
        let net_path = Path::new("/sys/class/net");

        if !net_path.exists() {
            return Err(WifiMgrError::Scan(
                "/sys/class/net not available".to_string()
            ));
        }

        let mut entries = fs::read_dir(net_path).await?;
        let mut interfaces = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                // Wireless interfaces carry a "wireless" sysfs subdirectory
                if entry.path().join("wireless").exists() {
                    interfaces.push(name.to_string());
                }
            }
        }

        interfaces.sort();
        Ok(interfaces)
    }

    async fn scan(&self, interface: &str) -> WifiMgrResult<Vec<String>> {
        validation::validate_interface_name(interface)?;

        // A triggered scan fails while one is already in flight; fall back
        // to dumping the most recent results
        let output = match self.run_iw(&["dev", interface, "scan"]).await {
            Ok(output) => output,
            Err(e) => {
                debug!("Scan trigger on {} failed ({}), using scan dump", interface, e);
                self.run_iw(&["dev", interface, "scan", "dump"]).await?
            }
        };

        Ok(parse_scan_output(&output))
    }

    async fn current_ssid(&self, interface: &str) -> WifiMgrResult<Option<String>> {
        validation::validate_interface_name(interface)?;

        let output = Command::new("iwgetid")
            .args(["-r", interface])
            .output()
            .await
            .map_err(|e| WifiMgrError::Scan(format!("iwgetid -r {}: {}", interface, e)))?;

        // iwgetid exits non-zero when not associated
        if !output.status.success() {
            return Ok(None);
        }

        let ssid = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if ssid.is_empty() { None } else { Some(ssid) })
    }
}

impl Default for IwScanner {
    fn default() -> Self {
        Self::new()
    }
}
