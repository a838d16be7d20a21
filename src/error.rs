//! Error types for wifimgr

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum WifiMgrError {
    /// IO error
    Io(io::Error),
    /// Command execution failed
    CommandFailed { cmd: String, code: Option<i32>, stderr: String },
    /// Daemon command line could not be parsed or the process could not be spawned
    Spawn { cmd: String, reason: String },
    /// Configuration file unreadable or missing (fatal at startup)
    Config(String),
    /// Parse error
    Parse(String),
    /// Invalid parameter
    InvalidParameter(String),
    /// Interface not found
    InterfaceNotFound(String),
    /// WiFi scan failed
    Scan(String),
    /// Connectivity test deadline exceeded
    ConnectionTimeout { ssid: String, secs: u64 },
    /// Timeout
    Timeout(String),
    /// Invalid state
    InvalidState(String),
}

impl fmt::Display for WifiMgrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WifiMgrError::Io(e) => write!(f, "IO error: {}", e),
            WifiMgrError::CommandFailed { cmd, code, stderr } => {
                if let Some(code) = code {
                    write!(f, "Command '{}' failed with code {}: {}", cmd, code, stderr)
                } else {
                    write!(f, "Command '{}' failed: {}", cmd, stderr)
                }
            }
            WifiMgrError::Spawn { cmd, reason } => {
                write!(f, "Failed to start '{}': {}", cmd, reason)
            }
            WifiMgrError::Config(msg) => write!(f, "Configuration error: {}", msg),
            WifiMgrError::Parse(msg) => write!(f, "Parse error: {}", msg),
            WifiMgrError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            WifiMgrError::InterfaceNotFound(name) => write!(f, "Interface not found: {}", name),
            WifiMgrError::Scan(msg) => write!(f, "Scan failed: {}", msg),
            WifiMgrError::ConnectionTimeout { ssid, secs } => {
                write!(f, "Failed to associate with '{}' within {}s", ssid, secs)
            }
            WifiMgrError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            WifiMgrError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for WifiMgrError {}

impl From<io::Error> for WifiMgrError {
    fn from(error: io::Error) -> Self {
        WifiMgrError::Io(error)
    }
}

pub type WifiMgrResult<T> = Result<T, WifiMgrError>;
