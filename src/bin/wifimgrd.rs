//! WiFi Mode Arbitration Daemon (wifimgrd)
//!
//! Long-running daemon that keeps a wireless interface in client mode while
//! a known network is visible and falls back to hotspot mode after a
//! sustained absence.
//!
//! # Usage
//!
//! ```bash
//! # Arbitrate the default interface (requires root)
//! sudo wifimgrd
//!
//! # Pick an interface and a wpa_supplicant conf
//! sudo wifimgrd --interface wlan1 --wpa-conf /etc/wpa_supplicant/wpa_supplicant.conf
//!
//! # Load full settings from a TOML file
//! sudo wifimgrd --config /etc/wifimgr/wifimgr.toml
//! ```

use clap::Parser;
use libwifimgr::error::{WifiMgrError, WifiMgrResult};
use libwifimgr::{ModeArbiter, WifiMgrConfig};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// WiFi Mode Arbitration Daemon
#[derive(Parser, Debug)]
#[command(name = "wifimgrd")]
#[command(author = "wifimgr contributors")]
#[command(version)]
#[command(about = "Arbitrates a wireless interface between client and hotspot mode", long_about = None)]
struct Args {
    /// Wireless interface to arbitrate
    #[arg(short, long)]
    interface: Option<String>,

    /// wpa_supplicant conf holding the known networks
    #[arg(short, long)]
    wpa_conf: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> WifiMgrResult<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting WiFi Mode Arbitration Daemon (wifimgrd)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    #[cfg(target_os = "linux")]
    {
        let uid = unsafe { libc::getuid() };
        if uid != 0 {
            warn!("Not running as root - interface and daemon control will fail");
        }
    }

    let mut config = match &args.config {
        Some(path) => WifiMgrConfig::load(path)?,
        None => WifiMgrConfig::default(),
    };
    if let Some(interface) = args.interface {
        config.interface = interface;
    }
    if let Some(wpa_conf) = args.wpa_conf {
        config.wpa_conf_path = wpa_conf;
    }

    let arbiter = ModeArbiter::with_system_platform(config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = handle_signals(shutdown_tx).await {
            error!("Signal handler error: {}", e);
        }
    });

    arbiter.run(shutdown_rx).await?;

    info!("WiFi Mode Arbitration Daemon stopped");
    Ok(())
}

/// Initialize logging based on command-line arguments
fn init_logging(args: &Args) {
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("wifimgrd={},libwifimgr={}", log_level, log_level))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(atty::is(atty::Stream::Stdout))
        .init();
}

/// Handle Unix signals (SIGTERM, SIGINT)
async fn handle_signals(shutdown: watch::Sender<bool>) -> WifiMgrResult<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| WifiMgrError::InvalidState(format!("Failed to register SIGTERM handler: {}", e)))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| WifiMgrError::InvalidState(format!("Failed to register SIGINT handler: {}", e)))?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            }
        }

        let _ = shutdown.send(true);
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| WifiMgrError::InvalidState(format!("Failed to listen for Ctrl+C: {}", e)))?;
        info!("Received Ctrl+C, initiating graceful shutdown");
        let _ = shutdown.send(true);
    }

    Ok(())
}
