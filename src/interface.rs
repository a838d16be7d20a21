//! Network interface control
//!
//! Low-level interface management using the ip command. The operations the
//! arbiter needs are behind the `InterfaceOps` trait so tests can substitute
//! a fake that never touches the host.

use crate::error::{WifiMgrError, WifiMgrResult};
use crate::validation;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Interface operations the mode arbiter depends on
#[async_trait]
pub trait InterfaceOps: Send + Sync {
    /// Bring the interface down, flush all addresses, bring it back up.
    ///
    /// Abandoned on the first failing step: a half-reset interface is not
    /// safe to hand to either daemon mode, and the caller retries the whole
    /// transition on its next tick anyway.
    async fn reset(&self, interface: &str) -> WifiMgrResult<()>;

    /// Assign a static address, used when entering hotspot mode after a
    /// successful reset.
    async fn assign_static(&self, interface: &str, address: &str, prefix_len: u8) -> WifiMgrResult<()>;

    /// Bring the interface up.
    async fn up(&self, interface: &str) -> WifiMgrResult<()>;
}

/// Interface controller shelling out to ip(8)
pub struct InterfaceController {
    // Future: could hold state or config
}

impl InterfaceController {
    pub fn new() -> Self {
        Self {}
    }

    async fn run_ip(&self, args: &[&str]) -> WifiMgrResult<()> {
        let cmd_str = format!("ip {}", args.join(" "));
        debug!("Running: {}", cmd_str);

        let output = Command::new("ip")
            .args(args)
            .output()
            .await
            .map_err(|e| WifiMgrError::CommandFailed {
                cmd: cmd_str.clone(),
                code: None,
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(WifiMgrError::CommandFailed {
                cmd: cmd_str,
                code: output.status.code(),
                stderr,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl InterfaceOps for InterfaceController {
    async fn reset(&self, interface: &str) -> WifiMgrResult<()> {
        validation::validate_interface_name(interface)?;

        self.run_ip(&["link", "set", "dev", interface, "down"]).await?;
        self.run_ip(&["addr", "flush", "dev", interface]).await?;
        self.run_ip(&["link", "set", "dev", interface, "up"]).await
    }

    async fn assign_static(&self, interface: &str, address: &str, prefix_len: u8) -> WifiMgrResult<()> {
        validation::validate_interface_name(interface)?;

        let addr = format!("{}/{}", address, prefix_len);
        self.run_ip(&["addr", "add", &addr, "dev", interface]).await?;
        self.run_ip(&["link", "set", "dev", interface, "up"]).await
    }

    async fn up(&self, interface: &str) -> WifiMgrResult<()> {
        validation::validate_interface_name(interface)?;
        self.run_ip(&["link", "set", "dev", interface, "up"]).await
    }
}

impl Default for InterfaceController {
    fn default() -> Self {
        Self::new()
    }
}
