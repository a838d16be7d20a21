//! wifimgr - WiFi Mode Arbitration Library
//!
//! Keeps a wireless interface useful without human intervention: while a
//! known network is visible the interface runs as a wifi client, and after
//! a sustained absence it becomes its own access point. Provides:
//! - wpa_supplicant conf parsing, generation and appends
//! - Interface reset and static addressing (ip)
//! - Supervision of wpa_supplicant/hostapd/dnsmasq child processes
//! - WiFi scanning (iw) behind a swappable capability trait
//! - The arbitration loop and a one-shot connectivity test

pub mod error;
pub mod validation;
pub mod config;
pub mod wpa_conf;
pub mod interface;
pub mod supervisor;
pub mod scanner;
pub mod hotspot;
pub mod arbiter;

// Re-export commonly used types
pub use error::{WifiMgrError, WifiMgrResult};
pub use config::{CommandTemplates, HotspotSettings, WifiMgrConfig};
pub use wpa_conf::{append_network, parse_networks, parse_wpa_conf, WpaNetwork};
pub use interface::{InterfaceController, InterfaceOps};
pub use supervisor::{DaemonRole, ManagedProcess};
pub use scanner::{IwScanner, WifiScanner};
pub use arbiter::{DaemonStatus, Mode, ModeArbiter};
