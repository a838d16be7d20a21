//! Supervision of external daemons (wpa_supplicant, hostapd, dnsmasq)
//!
//! Daemons are plain child processes. Their stdout and stderr are merged
//! line-by-line into the log, tagged with the daemon role; no output is
//! buffered for later retrieval. Termination is signal-then-wait with the
//! signal chosen per role.

use crate::error::{WifiMgrError, WifiMgrResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Capacity of the merged stdout/stderr line channel
const OUTPUT_CHANNEL_CAPACITY: usize = 10;

/// The three daemon roles. At most one live process per role system-wide;
/// the arbiter's critical section enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonRole {
    /// wpa_supplicant, client mode
    Station,
    /// hostapd, hotspot mode
    AccessPoint,
    /// dnsmasq, hotspot mode
    AddressServer,
}

impl DaemonRole {
    /// Tag prepended to every logged output line
    pub fn tag(&self) -> &'static str {
        match self {
            DaemonRole::Station => "wpa_supplicant",
            DaemonRole::AccessPoint => "hostapd",
            DaemonRole::AddressServer => "dnsmasq",
        }
    }

    /// Signal used to terminate the daemon. The station daemon does not
    /// reliably honor SIGINT while associating, so it gets SIGKILL; the
    /// hotspot daemons shut down cleanly on SIGINT.
    fn stop_signal(&self) -> libc::c_int {
        match self {
            DaemonRole::Station => libc::SIGKILL,
            DaemonRole::AccessPoint | DaemonRole::AddressServer => libc::SIGINT,
        }
    }
}

impl fmt::Display for DaemonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A supervised child process
#[derive(Debug)]
pub struct ManagedProcess {
    cmdline: String,
    role: DaemonRole,
    child: Option<tokio::process::Child>,
}

impl ManagedProcess {
    /// Parse a command line and spawn it with supervised output.
    ///
    /// Two reader tasks forward stdout and stderr lines into one bounded
    /// channel; a consumer task drains the channel into the log until both
    /// readers are done and the channel closes. The tasks need no join
    /// handle, they end with the child's pipes.
    pub fn spawn(cmdline: &str, role: DaemonRole) -> WifiMgrResult<Self> {
        let argv = shell_words::split(cmdline).map_err(|e| {
            error!("Failed to parse command '{}': {}", cmdline, e);
            WifiMgrError::Spawn {
                cmd: cmdline.to_string(),
                reason: e.to_string(),
            }
        })?;

        let (program, args) = argv.split_first().ok_or_else(|| WifiMgrError::Spawn {
            cmd: cmdline.to_string(),
            reason: "empty command line".to_string(),
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn '{}': {}", cmdline, e);
                WifiMgrError::Spawn {
                    cmd: cmdline.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let (tx, mut rx) = mpsc::channel::<String>(OUTPUT_CHANNEL_CAPACITY);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_lines(stderr, tx));
        }

        // The channel closes once both readers have dropped their senders
        let tag = role.tag();
        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                info!("{}: {}", tag, line);
            }
        });

        debug!("Started {} (pid {:?})", role, child.id());

        Ok(Self {
            cmdline: cmdline.to_string(),
            role,
            child: Some(child),
        })
    }

    /// Liveness hint only: true while the handle has not been cleared.
    /// Start/stop decisions belong inside the arbiter's critical section.
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    pub fn role(&self) -> DaemonRole {
        self.role
    }

    pub fn cmdline(&self) -> &str {
        &self.cmdline
    }

    /// Terminate the process and clear the handle. Idempotent: a no-op if
    /// the handle is already cleared.
    ///
    /// An unclean exit is logged as a warning, never escalated; freeing the
    /// interface for the next mode must not be blocked by a misbehaving
    /// child.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Some(pid) = child.id() {
            let signal = self.role.stop_signal();
            debug!("Sending signal {} to {} (pid {})", signal, self.role, pid);
            let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
            if rc != 0 {
                warn!(
                    "Failed to signal {} (pid {}): {}",
                    self.role,
                    pid,
                    std::io::Error::last_os_error()
                );
            }
        }

        match child.wait().await {
            Ok(status) if status.success() => {
                debug!("{} exited cleanly", self.role);
            }
            Ok(status) => {
                warn!("{} did not exit cleanly: {}", self.role, status);
            }
            Err(e) => {
                warn!("Failed to wait for {}: {}", self.role, e);
            }
        }

        info!("Stopped {}", self.role);
    }
}

async fn pump_lines<R: AsyncRead + Unpin + Send + 'static>(reader: R, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_and_stop() {
        let mut process = ManagedProcess::spawn("/bin/sleep 600", DaemonRole::AccessPoint).unwrap();
        assert!(process.is_running());

        process.stop().await;
        assert!(!process.is_running());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut process = ManagedProcess::spawn("/bin/sleep 600", DaemonRole::Station).unwrap();
        process.stop().await;
        // Second stop must be a no-op
        process.stop().await;
        assert!(!process.is_running());
    }

    #[tokio::test]
    async fn test_spawn_rejects_unparseable_command() {
        let err = ManagedProcess::spawn("/bin/echo 'unterminated", DaemonRole::Station);
        assert!(matches!(err, Err(WifiMgrError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_spawn_rejects_missing_binary() {
        let err = ManagedProcess::spawn("/nonexistent/daemon --flag", DaemonRole::AddressServer);
        assert!(matches!(err, Err(WifiMgrError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_output_is_consumed() {
        // Produces output then exits; stop() after exit must still clear
        let mut process = ManagedProcess::spawn("/bin/echo hello", DaemonRole::AddressServer).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        process.stop().await;
        assert!(!process.is_running());
    }
}
