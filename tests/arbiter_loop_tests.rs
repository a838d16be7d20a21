//! Arbitration loop integration tests
//!
//! The loop runs against a scripted scanner and a no-op interface
//! controller, with the daemon command templates pointed at /bin/sleep so
//! real child processes get supervised without needing hostapd or root.
//! Timing knobs are shrunk so the grace window elapses in milliseconds.

use async_trait::async_trait;
use libwifimgr::error::{WifiMgrError, WifiMgrResult};
use libwifimgr::{
    wpa_conf, InterfaceOps, Mode, ModeArbiter, WifiMgrConfig, WifiScanner, WpaNetwork,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// Scanner whose visible SSIDs and association are set by the test
#[derive(Default)]
struct FakeScanner {
    visible: Mutex<Vec<String>>,
    associated: Mutex<Option<String>>,
    fail_scans: Mutex<bool>,
}

impl FakeScanner {
    fn set_visible(&self, ssids: &[&str]) {
        *self.visible.lock().unwrap() = ssids.iter().map(|s| s.to_string()).collect();
    }

    fn set_associated(&self, ssid: Option<&str>) {
        *self.associated.lock().unwrap() = ssid.map(str::to_string);
    }

    fn set_failing(&self, failing: bool) {
        *self.fail_scans.lock().unwrap() = failing;
    }
}

#[async_trait]
impl WifiScanner for FakeScanner {
    async fn wifi_interfaces(&self) -> WifiMgrResult<Vec<String>> {
        Ok(vec!["wlan0".to_string()])
    }

    async fn scan(&self, _interface: &str) -> WifiMgrResult<Vec<String>> {
        if *self.fail_scans.lock().unwrap() {
            return Err(WifiMgrError::Scan("scan unavailable".to_string()));
        }
        Ok(self.visible.lock().unwrap().clone())
    }

    async fn current_ssid(&self, _interface: &str) -> WifiMgrResult<Option<String>> {
        Ok(self.associated.lock().unwrap().clone())
    }
}

/// Interface controller that records calls and always succeeds
#[derive(Default)]
struct FakeInterface {
    resets: AtomicUsize,
    static_assigns: AtomicUsize,
}

#[async_trait]
impl InterfaceOps for FakeInterface {
    async fn reset(&self, _interface: &str) -> WifiMgrResult<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn assign_static(&self, _interface: &str, _address: &str, _prefix_len: u8) -> WifiMgrResult<()> {
        self.static_assigns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn up(&self, _interface: &str) -> WifiMgrResult<()> {
        Ok(())
    }
}

struct Harness {
    arbiter: Arc<ModeArbiter>,
    scanner: Arc<FakeScanner>,
    interface: Arc<FakeInterface>,
    shutdown: watch::Sender<bool>,
    // Keeps the conf file alive for the test's duration
    _conf: tempfile::NamedTempFile,
}

impl Harness {
    fn new() -> Self {
        let conf = tempfile::NamedTempFile::new().unwrap();
        let path = PathBuf::from(conf.path());
        for (ssid, passphrase) in [("ssid-1", "password-1"), ("ssid-2", "password-2")] {
            let network = WpaNetwork::from_passphrase(ssid, passphrase).unwrap();
            wpa_conf::append_network(&path, &network).unwrap();
        }

        let mut config = WifiMgrConfig {
            wpa_conf_path: path,
            tick_ms: 50,
            grace_ms: 300,
            connect_timeout_secs: 1,
            connect_poll_ms: 50,
            ..WifiMgrConfig::default()
        };
        config.commands.station = "/bin/sleep 600".to_string();
        config.commands.access_point = "/bin/sleep 600".to_string();
        config.commands.address_server = "/bin/sleep 600".to_string();

        let scanner = Arc::new(FakeScanner::default());
        let interface = Arc::new(FakeInterface::default());
        let arbiter = Arc::new(
            ModeArbiter::new(config, scanner.clone(), interface.clone()).unwrap(),
        );
        let (shutdown, _) = watch::channel(false);

        Self {
            arbiter,
            scanner,
            interface,
            shutdown,
            _conf: conf,
        }
    }

    fn spawn_loop(&self) -> tokio::task::JoinHandle<WifiMgrResult<()>> {
        let arbiter = self.arbiter.clone();
        let rx = self.shutdown.subscribe();
        tokio::spawn(async move { arbiter.run(rx).await })
    }

    /// Poll until the arbiter reaches `mode`, asserting the role-exclusion
    /// invariant at every sample
    async fn wait_for_mode(&self, mode: Mode, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            self.assert_role_exclusion().await;
            if self.arbiter.mode().await == mode {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {:?}, still {:?}",
                mode,
                self.arbiter.mode().await
            );
            sleep(Duration::from_millis(20)).await;
        }
    }

    async fn assert_role_exclusion(&self) {
        let status = self.arbiter.daemon_status().await;
        assert!(
            !(status.station && (status.access_point || status.address_server)),
            "station and hotspot roles live simultaneously: {:?}",
            status
        );
    }

    async fn stop_loop(&self, handle: tokio::task::JoinHandle<WifiMgrResult<()>>) {
        self.shutdown.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn constructor_requires_existing_conf() {
    let config = WifiMgrConfig {
        wpa_conf_path: PathBuf::from("/path/that/does/not/exist"),
        ..WifiMgrConfig::default()
    };
    let result = ModeArbiter::new(
        config,
        Arc::new(FakeScanner::default()),
        Arc::new(FakeInterface::default()),
    );
    assert!(matches!(result, Err(WifiMgrError::Config(_))));
}

#[tokio::test]
async fn hotspot_starts_only_after_grace_window() {
    let harness = Harness::new();
    let handle = harness.spawn_loop();

    // Well inside the grace window nothing may have started
    sleep(Duration::from_millis(150)).await;
    assert_eq!(harness.arbiter.mode().await, Mode::Idle);
    assert_eq!(harness.interface.static_assigns.load(Ordering::SeqCst), 0);

    harness.wait_for_mode(Mode::Hotspot, Duration::from_secs(2)).await;

    let status = harness.arbiter.daemon_status().await;
    assert!(status.access_point);
    assert!(status.address_server);
    assert!(!status.station);

    // Exactly one hotspot-start transition, and never a station start
    sleep(Duration::from_millis(300)).await;
    assert_eq!(harness.interface.static_assigns.load(Ordering::SeqCst), 1);

    harness.stop_loop(handle).await;
    assert_eq!(harness.arbiter.mode().await, Mode::Idle);
    let status = harness.arbiter.daemon_status().await;
    assert!(!status.station && !status.access_point && !status.address_server);
}

#[tokio::test]
async fn known_network_sighting_leaves_hotspot() {
    let harness = Harness::new();
    let handle = harness.spawn_loop();

    harness.wait_for_mode(Mode::Hotspot, Duration::from_secs(2)).await;

    harness.scanner.set_visible(&["other-net", "ssid-1"]);
    harness.wait_for_mode(Mode::Client, Duration::from_secs(2)).await;

    let status = harness.arbiter.daemon_status().await;
    assert!(status.station);
    assert!(!status.access_point);
    assert!(!status.address_server);

    harness.stop_loop(handle).await;
}

#[tokio::test]
async fn sighting_resets_absence_timer() {
    let harness = Harness::new();
    let handle = harness.spawn_loop();

    harness.wait_for_mode(Mode::Hotspot, Duration::from_secs(2)).await;
    harness.scanner.set_visible(&["ssid-2"]);
    harness.wait_for_mode(Mode::Client, Duration::from_secs(2)).await;

    // Visibility drops again; the grace window restarts from the last
    // sighting, so client mode must survive at least half of it
    harness.scanner.set_visible(&[]);
    sleep(Duration::from_millis(150)).await;
    assert_eq!(harness.arbiter.mode().await, Mode::Client);

    harness.wait_for_mode(Mode::Hotspot, Duration::from_secs(2)).await;

    harness.stop_loop(handle).await;
}

#[tokio::test]
async fn scan_errors_behave_like_true_negatives() {
    let harness = Harness::new();
    harness.scanner.set_failing(true);
    let handle = harness.spawn_loop();

    // Errors must not reset the absence timer, so the hotspot still comes
    // up once the grace window has elapsed
    harness.wait_for_mode(Mode::Hotspot, Duration::from_secs(2)).await;

    // And errors must not tear an established hotspot down
    sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.arbiter.mode().await, Mode::Hotspot);

    harness.stop_loop(handle).await;
}

#[tokio::test]
async fn unknown_ssids_do_not_count_as_sightings() {
    let harness = Harness::new();
    harness.scanner.set_visible(&["somebody-elses-wifi"]);
    let handle = harness.spawn_loop();

    harness.wait_for_mode(Mode::Hotspot, Duration::from_secs(2)).await;

    harness.stop_loop(handle).await;
}

#[tokio::test]
async fn test_connect_times_out_and_cleans_up() {
    let harness = Harness::new();

    let network = WpaNetwork::from_passphrase("ssid-1", "password-1").unwrap();
    let result = harness.arbiter.test_connect(&network).await;
    assert!(matches!(result, Err(WifiMgrError::ConnectionTimeout { .. })));

    // The station daemon must be stopped even on failure
    let status = harness.arbiter.daemon_status().await;
    assert!(!status.station);
    assert_eq!(harness.arbiter.mode().await, Mode::Idle);
}

#[tokio::test]
async fn test_connect_succeeds_when_association_appears() {
    let harness = Harness::new();
    harness.scanner.set_associated(Some("ssid-1"));

    let network = WpaNetwork::from_passphrase("ssid-1", "password-1").unwrap();
    harness.arbiter.test_connect(&network).await.unwrap();

    let status = harness.arbiter.daemon_status().await;
    assert!(!status.station);
}

#[tokio::test]
async fn test_connect_excludes_the_loop_and_stops_hotspot() {
    let harness = Harness::new();
    let handle = harness.spawn_loop();

    harness.wait_for_mode(Mode::Hotspot, Duration::from_secs(2)).await;

    harness.scanner.set_associated(Some("ssid-2"));
    let network = WpaNetwork::from_passphrase("ssid-2", "password-2").unwrap();
    harness.arbiter.test_connect(&network).await.unwrap();

    // The test owns the station slot under the shared lock; afterwards the
    // hotspot is gone and no role is left running
    harness.assert_role_exclusion().await;
    let status = harness.arbiter.daemon_status().await;
    assert!(!status.station && !status.access_point && !status.address_server);

    harness.stop_loop(handle).await;
}
