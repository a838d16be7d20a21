//! Input validation for values spliced into shell commands and config files

use crate::error::{WifiMgrError, WifiMgrResult};

/// Maximum length for interface names (IFNAMSIZ - 1)
const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Maximum SSID length per 802.11
const MAX_SSID_LEN: usize = 32;

/// Validate a network interface name
///
/// Interface names are passed to ip/iw/iwgetid and spliced into daemon
/// command lines, so anything outside a conservative character set is
/// rejected.
pub fn validate_interface_name(name: &str) -> WifiMgrResult<()> {
    if name.is_empty() {
        return Err(WifiMgrError::InvalidParameter(
            "Interface name cannot be empty".to_string()
        ));
    }

    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(WifiMgrError::InvalidParameter(
            format!("Interface name too long (max {} characters)", MAX_INTERFACE_NAME_LEN)
        ));
    }

    // Only allow alphanumeric, dash, underscore
    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' {
            return Err(WifiMgrError::InvalidParameter(
                format!("Invalid interface name '{}': contains invalid character '{}'", name, c)
            ));
        }
    }

    // Don't allow names starting with dash (could be interpreted as option)
    if name.starts_with('-') {
        return Err(WifiMgrError::InvalidParameter(
            "Interface name cannot start with dash".to_string()
        ));
    }

    Ok(())
}

/// Validate an SSID before it is written into a wpa_supplicant block
pub fn validate_ssid(ssid: &str) -> WifiMgrResult<()> {
    if ssid.is_empty() {
        return Err(WifiMgrError::InvalidParameter(
            "SSID cannot be empty".to_string()
        ));
    }

    if ssid.len() > MAX_SSID_LEN {
        return Err(WifiMgrError::InvalidParameter(
            format!("SSID too long (max {} bytes)", MAX_SSID_LEN)
        ));
    }

    // Control characters and double quotes would corrupt the conf block
    if ssid.chars().any(|c| c.is_control() || c == '"') {
        return Err(WifiMgrError::InvalidParameter(
            format!("SSID '{}' contains invalid characters", ssid.escape_debug())
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_names() {
        assert!(validate_interface_name("wlan0").is_ok());
        assert!(validate_interface_name("wlp2s0").is_ok());
        assert!(validate_interface_name("").is_err());
        assert!(validate_interface_name("wlan0; rm -rf /").is_err());
        assert!(validate_interface_name("-flag").is_err());
        assert!(validate_interface_name("averyveryverylongname").is_err());
    }

    #[test]
    fn test_ssids() {
        assert!(validate_ssid("home network").is_ok());
        assert!(validate_ssid("").is_err());
        assert!(validate_ssid("bad\"quote").is_err());
        assert!(validate_ssid("line\nbreak").is_err());
    }
}
