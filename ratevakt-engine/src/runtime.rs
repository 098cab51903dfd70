/*!
# Runtime

Production wiring shared by every frontend: configuration → blocker →
live capture → monitor, until a shutdown future resolves or capture ends.
*/

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use ratevakt_capture::{PcapOptions, PcapSource};
use ratevakt_config::{CaptureConfig, FirewallBackendKind, PreventionConfig, RatevaktConfig};
use ratevakt_core::ThresholdPolicy;
use ratevakt_prevention::{BlockedLog, Blocker, DryRun, FirewallBackend, Iptables, Whitelist};
use ratevakt_telemetry::MetricsRecorder;
use tracing::{error, info, instrument};

use crate::engine::{EngineError, IngestExit, Monitor};

/// `path` if given, otherwise the default layered lookup.
pub fn load_config(path: Option<&Path>) -> Result<RatevaktConfig, EngineError> {
    let config = match path {
        Some(path) => RatevaktConfig::load_from_path(path)?,
        None => RatevaktConfig::load()?,
    };
    Ok(config)
}

pub fn pcap_options(config: &CaptureConfig) -> PcapOptions {
    PcapOptions {
        interface: config.interface.clone(),
        snapshot_len: config.snapshot_len,
        promiscuous: config.promiscuous,
        read_timeout_ms: config.read_timeout_ms,
        port: config.port,
    }
}

/// Whitelist, blocked log and firewall backend from the prevention section.
pub fn build_blocker(config: &PreventionConfig) -> Result<Blocker, EngineError> {
    let whitelist = Whitelist::load(config.whitelist_file.as_deref(), config.whitelist.clone());
    let log = match &config.blocked_file {
        Some(path) => BlockedLog::new(path),
        None => BlockedLog::disabled(),
    };
    let firewall: Box<dyn FirewallBackend> = match config.firewall.backend {
        FirewallBackendKind::Iptables => Box::new(Iptables::new(config.firewall.chain.clone())),
        FirewallBackendKind::DryRun => Box::new(DryRun::new()),
    };
    Ok(Blocker::new(whitelist, log, firewall)?)
}

/// Runs live capture until `shutdown` resolves or the capture source ends.
///
/// Startup failures (bad policy, unreadable blocked list, capture device
/// that cannot be opened) are returned before anything is spawned. A capture
/// failure while running is returned after an orderly shutdown.
#[instrument(level = "info", name = "run_production_mode", skip_all, fields(interface = %config.capture.interface))]
pub async fn run_production_mode<F>(
    config: &RatevaktConfig,
    metrics: MetricsRecorder,
    shutdown: F,
) -> Result<(), EngineError>
where
    F: Future<Output = ()>,
{
    let policy = ThresholdPolicy::new(config.monitor.threshold, config.monitor.window())?;
    let blocker = Arc::new(build_blocker(&config.prevention)?);

    let options = pcap_options(&config.capture);
    let handle = Monitor::new(policy, blocker.clone(), blocker.clone(), metrics.clone())
        .start(move || PcapSource::open(&options))?;
    info!(
        "Monitoring {}: threshold {} packets per {} ms",
        config.capture.interface, config.monitor.threshold, config.monitor.window_ms
    );

    let capture_ended = handle.capture_ended();
    let stop_requested = tokio::select! {
        _ = shutdown => true,
        _ = capture_ended.cancelled() => false,
    };

    let exit = if stop_requested {
        info!("Shutdown requested");
        handle.stop().await?
    } else {
        info!("Capture ended");
        handle.wait().await?
    };
    if let Err(e) = blocker.flush().await {
        error!("Blocked list left incomplete: {e}");
    }
    log_summary(&metrics, blocker.blocked_count());

    match exit {
        IngestExit::Failed(e) => Err(e.into()),
        IngestExit::Cancelled | IngestExit::EndOfStream => Ok(()),
    }
}

fn log_summary(metrics: &MetricsRecorder, blocked: usize) {
    info!(
        packets = metrics.packets_seen.get(),
        counted = metrics.packets_counted.get(),
        windows = metrics.windows_evaluated.get(),
        decisions = metrics.block_decisions.get(),
        failures = metrics.enforcement_failures.get(),
        blocked,
        "Monitor stopped"
    );
}
