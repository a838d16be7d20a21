//! wifimgr CLI
//!
//! Thin command-line front end over the library: manage known networks and
//! run manual validation without the daemon.

use clap::{Parser, Subcommand};
use libwifimgr::error::{WifiMgrError, WifiMgrResult};
use libwifimgr::{wpa_conf, IwScanner, ModeArbiter, WifiMgrConfig, WifiScanner, WpaNetwork};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// WiFi manager command-line tool
#[derive(Parser, Debug)]
#[command(name = "wifimgr")]
#[command(author = "wifimgr contributors")]
#[command(version)]
#[command(about = "Manage known networks and test connectivity", long_about = None)]
struct Args {
    /// wpa_supplicant conf holding the known networks
    #[arg(short, long)]
    wpa_conf: Option<PathBuf>,

    /// Wireless interface
    #[arg(short, long)]
    interface: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive a credential and append it to the known networks
    AddNetwork {
        ssid: String,
        /// Omit for an open network
        passphrase: Option<String>,
    },
    /// List the known networks
    ListNetworks,
    /// Start client mode against a known network and wait for association
    TestConnect { ssid: String },
    /// Show SSIDs currently visible on the interface
    Scan,
}

#[tokio::main]
async fn main() -> WifiMgrResult<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("libwifimgr={}", args.log_level)));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(atty::is(atty::Stream::Stdout))
        .init();

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

    match args.command {
        Command::AddNetwork { ssid, passphrase } => {
            let network = WpaNetwork::from_passphrase(&ssid, passphrase.as_deref().unwrap_or(""))?;
            wpa_conf::append_network(&config.wpa_conf_path, &network)?;
            println!("Added '{}' to {}", ssid, config.wpa_conf_path.display());
        }
        Command::ListNetworks => {
            let networks = wpa_conf::parse_wpa_conf(&config.wpa_conf_path).await?;
            if networks.is_empty() {
                println!("No known networks in {}", config.wpa_conf_path.display());
            }
            for network in networks {
                println!("{}", network);
            }
        }
        Command::TestConnect { ssid } => {
            let networks = wpa_conf::parse_wpa_conf(&config.wpa_conf_path).await?;
            let network = networks
                .into_iter()
                .find(|n| n.ssid == ssid)
                .ok_or_else(|| {
                    WifiMgrError::InvalidParameter(format!("'{}' is not a known network", ssid))
                })?;

            let timeout = config.connect_timeout_secs;
            let arbiter = ModeArbiter::with_system_platform(config)?;
            arbiter.test_connect(&network).await?;
            println!("Associated with '{}' within {}s", ssid, timeout);
        }
        Command::Scan => {
            let scanner = IwScanner::new();
            let ssids = scanner.scan(&config.interface).await?;
            if ssids.is_empty() {
                println!("No networks visible on {}", config.interface);
            }
            for ssid in ssids {
                println!("{}", ssid);
            }
        }
    }

    Ok(())
}
