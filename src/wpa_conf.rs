//! wpa_supplicant configuration parsing and generation
//!
//! The conf file is the single durable source of known networks. Parsing is
//! best-effort: malformed `network=` fragments are skipped, a block without
//! an SSID is dropped. Appends are the only mutation; blocks are never
//! rewritten in place.

use crate::error::{WifiMgrError, WifiMgrResult};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use std::fmt;
use std::io::Write;
use std::path::Path;

/// PBKDF2 iteration count used by WPA-PSK (IEEE 802.11i)
const WPA_PSK_ITERATIONS: u32 = 4096;

/// One `network={ ... }` block from a wpa_supplicant conf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WpaNetwork {
    pub ssid: String,
    /// Derived PSK as lowercase hex, empty for open networks
    pub psk: String,
    /// Plaintext passphrase recovered from the commented `#psk=` line,
    /// retained only so appended blocks round-trip
    pub password: String,
}

impl fmt::Display for WpaNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(ssid={} psk={})", self.ssid, self.psk)
    }
}

impl WpaNetwork {
    /// Derive a credential from an SSID and plaintext passphrase.
    ///
    /// The PSK is PBKDF2-HMAC-SHA1(passphrase, ssid, 4096, 32), matching the
    /// output of the wpa_passphrase utility byte for byte. An empty
    /// passphrase produces an open-network credential with no PSK.
    pub fn from_passphrase(ssid: &str, passphrase: &str) -> WifiMgrResult<Self> {
        crate::validation::validate_ssid(ssid)?;

        if passphrase.is_empty() {
            return Ok(Self {
                ssid: ssid.to_string(),
                psk: String::new(),
                password: String::new(),
            });
        }

        if passphrase.len() < 8 || passphrase.len() > 63 {
            return Err(WifiMgrError::InvalidParameter(
                "Passphrase must be 8..63 characters".to_string()
            ));
        }

        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha1>(
            passphrase.as_bytes(),
            ssid.as_bytes(),
            WPA_PSK_ITERATIONS,
            &mut key,
        );

        let psk = key.iter().fold(String::with_capacity(64), |mut s, b| {
            use fmt::Write;
            let _ = write!(s, "{:02x}", b);
            s
        });

        Ok(Self {
            ssid: ssid.to_string(),
            psk,
            password: passphrase.to_string(),
        })
    }

    /// Render this credential as a conf block.
    ///
    /// The block keeps the wpa_passphrase layout: ssid, commented plaintext,
    /// derived psk, in that order, so re-parsing is loss-less for ssid and
    /// psk. Open networks get a `key_mgmt=NONE` block instead.
    pub fn as_conf(&self) -> String {
        if self.psk.is_empty() {
            format!(
                "network={{\n\tssid=\"{}\"\n\tkey_mgmt=NONE\n\tpriority=-1\n}}",
                self.ssid
            )
        } else {
            format!(
                "network={{\n\tssid=\"{}\"\n\t#psk=\"{}\"\n\tpsk={}\n}}",
                self.ssid, self.password, self.psk
            )
        }
    }
}

/// Parse all well-formed network blocks out of conf text.
///
/// Scans for `network={` openers and takes each block up to its closing
/// brace. A block that runs into the next opener before closing is
/// malformed and skipped, as is any block without an `ssid=` line.
pub fn parse_networks(text: &str) -> Vec<WpaNetwork> {
    const OPEN: &str = "network={";

    let mut networks = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(OPEN) {
        let body_start = start + OPEN.len();
        let after_open = &rest[body_start..];

        let close = after_open.find('}');
        let next_open = after_open.find(OPEN);

        match (close, next_open) {
            // Well-formed block: closing brace before any further opener
            (Some(c), n) if n.map_or(true, |n| c < n) => {
                if let Some(network) = parse_block(&after_open[..c]) {
                    networks.push(network);
                }
                rest = &after_open[c + 1..];
            }
            // Block spans into the next opener (or never closes): drop it
            (_, Some(n)) => rest = &after_open[n..],
            _ => break,
        }
    }

    networks
}

/// Extract ssid/psk/password fields from the inside of one block.
/// Returns None when no SSID line is present.
fn parse_block(body: &str) -> Option<WpaNetwork> {
    let mut ssid = None;
    let mut psk = None;
    let mut password = None;

    for line in body.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("ssid=\"") {
            if ssid.is_none() {
                ssid = value.strip_suffix('"').map(str::to_string);
            }
        } else if let Some(value) = line.strip_prefix("#psk=") {
            if password.is_none() {
                password = Some(value.trim_matches('"').to_string());
            }
        } else if let Some(value) = line.strip_prefix("psk=") {
            if psk.is_none() {
                psk = Some(value.to_string());
            }
        }
    }

    Some(WpaNetwork {
        ssid: ssid?,
        psk: psk.unwrap_or_default(),
        password: password.unwrap_or_default(),
    })
}

/// Parse a wpa_supplicant conf file.
///
/// Only an unreadable file is an error; malformed content degrades to
/// fewer (or zero) networks.
pub async fn parse_wpa_conf(path: impl AsRef<Path>) -> WifiMgrResult<Vec<WpaNetwork>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        WifiMgrError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    Ok(parse_networks(&text))
}

/// Append a credential block to the conf file.
///
/// The file handle lives only for this call; the write is flushed before
/// the handle is dropped on every exit path.
pub fn append_network(path: impl AsRef<Path>, network: &WpaNetwork) -> WifiMgrResult<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path.as_ref())?;

    file.write_all(format!("\n{}\n", network.as_conf()).as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONF: &str = r#"
asdf
network={
	ssid="ssid-1"
	psk=pw-1
}
dummy text
to make
sure
the scanner works
network=must fail
network=}
{
network=}

network={
	ssid="ssid-2"
	psk=pw-2
}"#;

    #[test]
    fn test_parse_skips_malformed_blocks() {
        let networks = parse_networks(CONF);
        assert_eq!(networks.len(), 2);
        assert_eq!(networks[0].ssid, "ssid-1");
        assert_eq!(networks[0].psk, "pw-1");
        assert_eq!(networks[1].ssid, "ssid-2");
        assert_eq!(networks[1].psk, "pw-2");
    }

    #[test]
    fn test_parse_drops_block_without_ssid() {
        let networks = parse_networks("network={\n\tpsk=orphan\n}");
        assert!(networks.is_empty());
    }

    #[test]
    fn test_parse_block_spanning_next_opener() {
        // First block never closes; scanner must resume at the second opener
        let text = "network={\n\tssid=\"broken\"\nnetwork={\n\tssid=\"ok\"\n\tpsk=x\n}";
        let networks = parse_networks(text);
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].ssid, "ok");
    }

    #[test]
    fn test_psk_matches_wpa_passphrase() {
        let network = WpaNetwork::from_passphrase("test ssid with spaces", "hello 123").unwrap();
        assert_eq!(
            network.psk,
            "1d2d5eb60ac569d0018f4572a324029efac83d4d4a605b6c7077fd1023715f37"
        );
    }

    #[test]
    fn test_round_trip() {
        let network = WpaNetwork::from_passphrase("home-net", "s3cret pass").unwrap();
        let parsed = parse_networks(&network.as_conf());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].ssid, network.ssid);
        assert_eq!(parsed[0].psk, network.psk);
        assert_eq!(parsed[0].password, network.password);
    }

    #[test]
    fn test_open_network_block() {
        let network = WpaNetwork::from_passphrase("cafe", "").unwrap();
        assert!(network.psk.is_empty());
        let conf = network.as_conf();
        assert!(conf.contains("key_mgmt=NONE"));
        let parsed = parse_networks(&conf);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].ssid, "cafe");
        assert!(parsed[0].psk.is_empty());
    }

    #[test]
    fn test_passphrase_length_limits() {
        assert!(WpaNetwork::from_passphrase("net", "short").is_err());
        assert!(WpaNetwork::from_passphrase("net", &"x".repeat(64)).is_err());
    }

    #[test]
    fn test_append_then_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wpa_supplicant.conf");

        let first = WpaNetwork::from_passphrase("network-1", "password-1").unwrap();
        let second = WpaNetwork::from_passphrase("network-2", "password-2").unwrap();
        append_network(&path, &first).unwrap();
        append_network(&path, &second).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let networks = parse_networks(&text);
        assert_eq!(networks.len(), 2);
        assert_eq!(networks[0].ssid, "network-1");
        assert_eq!(networks[0].psk, first.psk);
        assert_eq!(networks[1].ssid, "network-2");
        assert_eq!(networks[1].psk, second.psk);
    }
}
