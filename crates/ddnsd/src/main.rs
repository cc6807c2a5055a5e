// # ddnsd - DDNS Daemon
//
// The ddnsd daemon is a THIN integration layer. All reconciliation logic
// lives in ddns-core; this binary is responsible for:
// 1. Parsing command-line flags
// 2. Initializing logging
// 3. Running the installer, or loading and validating both config files
// 4. Wiring the HTTP IP source and Cloudflare provider into the engine
// 5. Running the engine until SIGINT/SIGTERM
//
// ## Configuration
//
// - `--env/-e <path>`: credentials file (default `/etc/bddns/users.conf`)
// - `--config/-c <path>`: zones file (default `/etc/bddns/sites.conf`)
// - `--time/-u <seconds>`: poll interval (default 300)
// - `--install`: scaffold both files under `/etc/bddns/` and exit
// - `--once`: run a single reconciliation pass and exit
// - `--dry-run`: perform lookups, log patches instead of sending them
// - `--log-level` / `DDNS_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// ddnsd --install
// $EDITOR /etc/bddns/users.conf /etc/bddns/sites.conf
// ddnsd --time 600
// ```

use anyhow::{Context, Result};
use clap::Parser;
use ddns_core::config::{Credentials, DdnsConfig, ManagedZoneSet};
use ddns_core::install::{self, DEFAULT_INSTALL_DIR};
use ddns_core::traits::IpVersion;
use ddns_core::DdnsEngine;
use ddns_ip_http::HttpIpSource;
use ddns_provider_cloudflare::CloudflareProvider;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_USERS_PATH: &str = "/etc/bddns/users.conf";
const DEFAULT_SITES_PATH: &str = "/etc/bddns/sites.conf";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep Cloudflare A records pointed at this host's public IP
#[derive(Parser, Debug)]
#[command(name = "ddnsd", version, about)]
struct Cli {
    /// Credentials file (users and API keys)
    #[arg(short = 'e', long = "env", default_value = DEFAULT_USERS_PATH)]
    env: PathBuf,

    /// Zones file (IP provider and managed zones)
    #[arg(short = 'c', long = "config", default_value = DEFAULT_SITES_PATH)]
    config: PathBuf,

    /// Time between updates in seconds
    #[arg(short = 'u', long = "time", default_value_t = 300)]
    time: u64,

    /// Runs installer, will create config files
    #[arg(long)]
    install: bool,

    /// Run one reconciliation pass and exit
    #[arg(long)]
    once: bool,

    /// Look everything up but do not modify records
    #[arg(long)]
    dry_run: bool,

    /// Log level
    #[arg(long, env = "DDNS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            eprintln!(
                "Log level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                other
            );
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    if cli.install {
        return run_install(Path::new(DEFAULT_INSTALL_DIR)).into();
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    info!("Starting ddnsd daemon");
    info!(
        "Configuration loaded: {} zone(s), polling every {}s",
        config.zones.zones.len(),
        config.engine.interval_secs
    );

    // One execution context: the loop is sequential end to end.
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(&cli, config).await {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Scaffold both config files, never overwriting existing ones
fn run_install(dir: &Path) -> DdnsExitCode {
    info!("Installing to {}", dir.display());

    match install::install(dir) {
        Ok(report) => {
            info!(
                "Install finished: {} file(s) created, {} left untouched",
                report.created.len(),
                report.skipped.len()
            );
            DdnsExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Install failed: {}", e);
            DdnsExitCode::ConfigError
        }
    }
}

/// Load credentials and zones, then validate the combined config
fn load_config(cli: &Cli) -> ddns_core::Result<DdnsConfig> {
    let credentials = Credentials::load(&cli.env)?;
    let zones = ManagedZoneSet::load(&cli.config, &credentials)?;

    let config = DdnsConfig::new(zones).with_interval_secs(cli.time);
    config.validate()?;

    for zone in &config.zones.zones {
        debug!(
            "Managing zone {} as {}: {}",
            zone.reference,
            zone.owner.username,
            zone.records.join(", ")
        );
    }

    Ok(config)
}

/// Run the daemon
async fn run_daemon(cli: &Cli, config: DdnsConfig) -> Result<()> {
    // A records only hold IPv4 addresses.
    let ip_source = HttpIpSource::new(config.zones.ip_provider.clone(), Some(IpVersion::V4))
        .context("Failed to create IP source")?;
    info!("Fetching the public address from {}", ip_source.url());
    let provider = CloudflareProvider::new(config.zones.api_base.clone(), cli.dry_run)
        .context("Failed to create Cloudflare provider")?;

    let (mut engine, mut events) = DdnsEngine::new(Box::new(ip_source), Box::new(provider), config)
        .context("Failed to create engine")?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    if cli.once {
        let report = engine.tick().await;
        info!(
            "Single pass finished: {} updated, {} unchanged, {} failed, {} zone(s) skipped",
            report.updated, report.unchanged, report.failed, report.zones_skipped
        );
        if report.address.is_none() {
            anyhow::bail!("Could not determine the public IP address");
        }
        if report.failed > 0 {
            anyhow::bail!("{} record update(s) failed", report.failed);
        }
        return Ok(());
    }

    engine.run_until(shutdown_signal()).await?;
    info!("Shutting down daemon");

    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Failed to setup SIGTERM handler: {}", e);
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received shutdown signal: SIGTERM"),
        _ = wait_for_ctrl_c() => info!("Received shutdown signal: SIGINT"),
    }
}

/// Wait for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn shutdown_signal() {
    wait_for_ctrl_c().await;
    info!("Received shutdown signal: SIGINT");
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for CTRL-C: {}", e);
        std::future::pending::<()>().await;
    }
}
