//! Mode arbitration between station and hotspot operation
//!
//! One long-lived loop decides, once per tick, whether the interface should
//! run as a wifi client or as its own access point, based on whether any
//! known network is visible. All mode-changing work happens under a single
//! lock, shared with the manual connectivity test, so at most one transition
//! is ever in flight. Loop-internal failures are logged and absorbed; the
//! loop only ends when the shutdown signal fires.

use crate::config::{CommandTemplates, WifiMgrConfig};
use crate::error::{WifiMgrError, WifiMgrResult};
use crate::hotspot;
use crate::interface::{InterfaceController, InterfaceOps};
use crate::scanner::{IwScanner, WifiScanner};
use crate::supervisor::{DaemonRole, ManagedProcess};
use crate::wpa_conf::{self, WpaNetwork};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Current operating mode.
///
/// `Transitioning` exists only while a start/stop sequence runs inside the
/// arbiter's critical section; `mode()` takes the same lock, so callers
/// never observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Before the first decision
    Idle,
    /// Station daemon owns the interface
    Client,
    /// Access-point and address-server daemons own the interface
    Hotspot,
    /// A start/stop sequence is executing under the lock
    Transitioning,
}

/// Liveness snapshot of the three daemon roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonStatus {
    pub station: bool,
    pub access_point: bool,
    pub address_server: bool,
}

/// The daemon handles, owned by the arbiter and mutated only inside the
/// tick/test critical section.
#[derive(Default)]
struct RunningDaemons {
    station: Option<ManagedProcess>,
    access_point: Option<ManagedProcess>,
    address_server: Option<ManagedProcess>,
    /// Generated dnsmasq conf; deleted on drop, after the daemon stopped
    dnsmasq_conf: Option<NamedTempFile>,
}

impl RunningDaemons {
    fn status(&self) -> DaemonStatus {
        DaemonStatus {
            station: self.station.as_ref().map_or(false, |p| p.is_running()),
            access_point: self.access_point.as_ref().map_or(false, |p| p.is_running()),
            address_server: self.address_server.as_ref().map_or(false, |p| p.is_running()),
        }
    }

    /// Mode implied by which daemons are alive
    fn mode(&self) -> Mode {
        if self.access_point.is_some() || self.address_server.is_some() {
            Mode::Hotspot
        } else if self.station.is_some() {
            Mode::Client
        } else {
            Mode::Idle
        }
    }
}

/// Everything guarded by the arbiter lock
struct ArbiterState {
    mode: Mode,
    daemons: RunningDaemons,
    known_ssids: HashSet<String>,
    /// Last confirmed known-network sighting; the grace window is measured
    /// from here. Failed scans never refresh it.
    last_seen: Instant,
}

/// The mode-arbitration state machine
pub struct ModeArbiter {
    config: WifiMgrConfig,
    scanner: Arc<dyn WifiScanner>,
    ifops: Arc<dyn InterfaceOps>,
    state: Mutex<ArbiterState>,
}

impl ModeArbiter {
    /// Create an arbiter with injected platform access.
    ///
    /// Fails only if the wpa conf path does not exist; everything after
    /// construction is logged and retried rather than propagated.
    pub fn new(
        config: WifiMgrConfig,
        scanner: Arc<dyn WifiScanner>,
        ifops: Arc<dyn InterfaceOps>,
    ) -> WifiMgrResult<Self> {
        if !config.wpa_conf_path.exists() {
            return Err(WifiMgrError::Config(format!(
                "WPA configuration file '{}' does not exist",
                config.wpa_conf_path.display()
            )));
        }

        Ok(Self {
            config,
            scanner,
            ifops,
            state: Mutex::new(ArbiterState {
                mode: Mode::Idle,
                daemons: RunningDaemons::default(),
                known_ssids: HashSet::new(),
                last_seen: Instant::now(),
            }),
        })
    }

    /// Arbiter wired to the real platform (iw scanning, ip interface ops)
    pub fn with_system_platform(config: WifiMgrConfig) -> WifiMgrResult<Self> {
        Self::new(
            config,
            Arc::new(IwScanner::new()),
            Arc::new(InterfaceController::new()),
        )
    }

    pub fn config(&self) -> &WifiMgrConfig {
        &self.config
    }

    pub async fn mode(&self) -> Mode {
        self.state.lock().await.mode
    }

    pub async fn daemon_status(&self) -> DaemonStatus {
        self.state.lock().await.daemons.status()
    }

    pub async fn known_ssids(&self) -> HashSet<String> {
        self.state.lock().await.known_ssids.clone()
    }

    /// Run the arbitration loop until `shutdown` flips to true.
    ///
    /// On shutdown every supervised daemon is stopped and the mode returns
    /// to Idle, giving the loop a clean terminal state.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> WifiMgrResult<()> {
        // The interface must come up before the first scan can work; this
        // is the one post-construction failure treated as fatal.
        self.ifops.up(&self.config.interface).await?;

        self.state.lock().await.last_seen = Instant::now();

        info!(
            "Arbitrating {} (tick {:?}, grace {:?})",
            self.config.interface,
            self.config.tick_interval(),
            self.config.grace_window()
        );

        loop {
            self.tick().await;

            tokio::select! {
                _ = sleep(self.config.tick_interval()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Shutdown requested, stopping supervised daemons");
        let mut state = self.state.lock().await;
        Self::stop_station(&mut state.daemons).await;
        Self::stop_hotspot(&mut state.daemons).await;
        state.mode = state.daemons.mode();
        Ok(())
    }

    /// One decide-and-transition pass, entirely under the lock
    async fn tick(&self) {
        let mut state = self.state.lock().await;

        self.refresh_known_networks(&mut state).await;

        debug!("Scanning for known SSIDs...");
        let visible = match self.scan_for_known(&state.known_ssids).await {
            Ok(ssids) => ssids,
            Err(e) => {
                // A failed scan counts as "nothing seen" this tick and
                // leaves the absence timer untouched
                warn!("Failed to scan for known SSIDs: {}", e);
                Vec::new()
            }
        };

        let now = Instant::now();

        if !visible.is_empty() {
            info!("Known SSIDs visible: {:?}", visible);
            state.last_seen = now;

            if state.daemons.access_point.is_some() {
                info!("Known network visible while hotspot is running, switching to client mode");
                state.mode = Mode::Transitioning;

                Self::stop_hotspot(&mut state.daemons).await;
                if let Err(e) = self.enter_client_mode(&mut state.daemons).await {
                    error!("Failed to start station daemon: {}", e);
                } else {
                    state.last_seen = Instant::now();
                }

                state.mode = state.daemons.mode();
            }
        } else {
            let absent_for = now.duration_since(state.last_seen);
            debug!("No known SSIDs visible (absent for {:?})", absent_for);

            if state.daemons.access_point.is_none() && absent_for > self.config.grace_window() {
                info!(
                    "No known network for {:?}, starting hotspot",
                    absent_for
                );
                state.mode = Mode::Transitioning;

                Self::stop_station(&mut state.daemons).await;
                if let Err(e) = self.enter_hotspot_mode(&mut state.daemons).await {
                    error!("Failed to start hotspot: {}", e);
                }

                state.mode = state.daemons.mode();
            }
        }
    }

    /// Rebuild the known-network set from the conf file. The set is
    /// replaced wholesale; on a read failure the previous set is kept.
    async fn refresh_known_networks(&self, state: &mut ArbiterState) {
        match wpa_conf::parse_wpa_conf(&self.config.wpa_conf_path).await {
            Ok(networks) => {
                state.known_ssids = networks.into_iter().map(|n| n.ssid).collect();
            }
            Err(e) => {
                warn!("Failed to reload known networks: {}", e);
            }
        }
    }

    /// Intersect the known set with what is visible across all wireless
    /// interfaces. Per-interface scan errors only surface when no known
    /// network was found anywhere.
    async fn scan_for_known(&self, known: &HashSet<String>) -> WifiMgrResult<Vec<String>> {
        let interfaces = self.scanner.wifi_interfaces().await?;
        if interfaces.is_empty() {
            return Err(WifiMgrError::Scan("No wifi interface found".to_string()));
        }

        let mut found = Vec::new();
        let mut errors = Vec::new();

        for interface in &interfaces {
            match self.scanner.scan(interface).await {
                Ok(ssids) => {
                    for ssid in ssids {
                        if known.contains(&ssid) && !found.contains(&ssid) {
                            found.push(ssid);
                        }
                    }
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        if found.is_empty() && !errors.is_empty() {
            return Err(WifiMgrError::Scan(errors.join("; ")));
        }

        Ok(found)
    }

    /// Reset the interface and start the station daemon against the known
    /// networks conf.
    async fn enter_client_mode(&self, daemons: &mut RunningDaemons) -> WifiMgrResult<()> {
        self.ifops.reset(&self.config.interface).await?;

        let cmdline = CommandTemplates::expand(
            &self.config.commands.station,
            &self.config.interface,
            &self.config.wpa_conf_path,
        );
        daemons.station = Some(ManagedProcess::spawn(&cmdline, DaemonRole::Station)?);
        info!("Started station daemon");
        Ok(())
    }

    /// Reset the interface, give it the hotspot address and start the
    /// access-point and address-server daemons.
    async fn enter_hotspot_mode(&self, daemons: &mut RunningDaemons) -> WifiMgrResult<()> {
        self.ifops.reset(&self.config.interface).await?;
        self.ifops
            .assign_static(
                &self.config.interface,
                &self.config.hotspot.address,
                self.config.hotspot.prefix_len,
            )
            .await?;

        let ap_cmdline = CommandTemplates::expand(
            &self.config.commands.access_point,
            &self.config.interface,
            &self.config.hotspot.hostapd_conf,
        );
        daemons.access_point = Some(ManagedProcess::spawn(&ap_cmdline, DaemonRole::AccessPoint)?);

        let dnsmasq_conf = hotspot::write_dnsmasq_conf(&self.config.hotspot, &self.config.interface)?;
        let dns_cmdline = CommandTemplates::expand(
            &self.config.commands.address_server,
            &self.config.interface,
            dnsmasq_conf.path(),
        );
        match ManagedProcess::spawn(&dns_cmdline, DaemonRole::AddressServer) {
            Ok(process) => {
                daemons.address_server = Some(process);
                daemons.dnsmasq_conf = Some(dnsmasq_conf);
            }
            Err(e) => {
                // The access point is already up; run degraded rather than
                // tear the hotspot back down
                warn!("Address-server daemon failed to start: {}", e);
            }
        }

        info!("Started hotspot");
        Ok(())
    }

    async fn stop_station(daemons: &mut RunningDaemons) {
        if let Some(mut process) = daemons.station.take() {
            process.stop().await;
        }
    }

    async fn stop_hotspot(daemons: &mut RunningDaemons) {
        if let Some(mut process) = daemons.access_point.take() {
            process.stop().await;
        }
        if let Some(mut process) = daemons.address_server.take() {
            process.stop().await;
        }
        // Deletes the generated conf
        daemons.dnsmasq_conf = None;
    }

    /// One-shot connectivity test against a candidate credential.
    ///
    /// Holds the arbiter lock for its whole duration, so it can never race
    /// the loop for the station role slot. The candidate is written to a
    /// scratch conf, the station daemon started against it, and association
    /// polled until the deadline. The daemon is always stopped before
    /// returning, success or not.
    pub async fn test_connect(&self, network: &WpaNetwork) -> WifiMgrResult<()> {
        use std::io::Write;

        let mut scratch = tempfile::Builder::new()
            .prefix("wifimgr-test-")
            .suffix(".conf")
            .tempfile()
            .map_err(|e| WifiMgrError::Config(format!("Failed to create scratch conf: {}", e)))?;
        scratch.write_all(network.as_conf().as_bytes())?;
        scratch.flush()?;

        let mut state = self.state.lock().await;
        state.mode = Mode::Transitioning;

        // Both daemon roles must be clear before the test owns the slot
        Self::stop_hotspot(&mut state.daemons).await;
        Self::stop_station(&mut state.daemons).await;

        let result = self.poll_association(&mut state.daemons, network, scratch.path()).await;

        Self::stop_station(&mut state.daemons).await;
        if result.is_ok() {
            state.last_seen = Instant::now();
        }
        state.mode = state.daemons.mode();

        result
    }

    async fn poll_association(
        &self,
        daemons: &mut RunningDaemons,
        network: &WpaNetwork,
        conf_path: &std::path::Path,
    ) -> WifiMgrResult<()> {
        self.ifops.reset(&self.config.interface).await?;

        let cmdline = CommandTemplates::expand(
            &self.config.commands.station,
            &self.config.interface,
            conf_path,
        );
        daemons.station = Some(ManagedProcess::spawn(&cmdline, DaemonRole::Station)?);

        let deadline = Instant::now() + Duration::from_secs(self.config.connect_timeout_secs);
        let poll = Duration::from_millis(self.config.connect_poll_ms);

        while Instant::now() < deadline {
            sleep(poll).await;

            match self.scanner.current_ssid(&self.config.interface).await {
                Ok(Some(ssid)) if ssid == network.ssid => {
                    info!("Associated with '{}'", ssid);
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => debug!("Association query failed: {}", e),
            }
        }

        Err(WifiMgrError::ConnectionTimeout {
            ssid: network.ssid.clone(),
            secs: self.config.connect_timeout_secs,
        })
    }
}
