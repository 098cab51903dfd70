use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use ratevakt_config::{FirewallBackendKind, RatevaktConfig};
use ratevakt_engine::{load_config, run_production_mode};
use ratevakt_telemetry::{EventLogger, MetricsRecorder};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Per-source packet rate monitor that blocks flooding hosts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture live traffic and block sources over the rate threshold
    Run(RunArgs),
    /// Validate and print the effective configuration as YAML
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration file (default: config/ratevakt.yaml + environment)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Interface to capture on
    #[arg(short, long)]
    pub interface: Option<String>,
    /// Packets per window a source may send before it is blocked
    #[arg(short, long)]
    pub threshold: Option<u64>,
    /// Window length in milliseconds
    #[arg(long)]
    pub window_ms: Option<u64>,
    /// Only watch traffic on this port (0 = all)
    #[arg(short, long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub snapshot_len: Option<i32>,
    /// Do not put the interface into promiscuous mode
    #[arg(long)]
    pub no_promisc: bool,
    /// Whitelist file, one IP per line
    #[arg(long)]
    pub whitelist: Option<PathBuf>,
    /// Blocked IP file, read at startup and appended on every block
    #[arg(long)]
    pub blocked: Option<PathBuf>,
    /// Log blocks instead of installing firewall rules
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CheckConfigArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    /// Flags win over every configuration layer.
    pub fn apply(&self, config: &mut RatevaktConfig) {
        if let Some(interface) = &self.interface {
            config.capture.interface = interface.clone();
        }
        if let Some(threshold) = self.threshold {
            config.monitor.threshold = threshold;
        }
        if let Some(window_ms) = self.window_ms {
            config.monitor.window_ms = window_ms;
        }
        if let Some(port) = self.port {
            config.capture.port = port;
        }
        if let Some(snapshot_len) = self.snapshot_len {
            config.capture.snapshot_len = snapshot_len;
        }
        if self.no_promisc {
            config.capture.promiscuous = false;
        }
        if let Some(path) = &self.whitelist {
            config.prevention.whitelist_file = Some(path.clone());
        }
        if let Some(path) = &self.blocked {
            config.prevention.blocked_file = Some(path.clone());
        }
        if self.dry_run {
            config.prevention.firewall.backend = FirewallBackendKind::DryRun;
        }
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::CheckConfig(args) => check_config(args),
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.check().context("invalid command line override")?;

    EventLogger::init(&config.telemetry.level, config.telemetry.json)
        .map_err(|e| anyhow!(e))
        .context("failed to initialise logging")?;
    let metrics = MetricsRecorder::new()?;

    run_production_mode(&config, metrics, shutdown_signal()).await?;
    Ok(())
}

fn check_config(args: CheckConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
