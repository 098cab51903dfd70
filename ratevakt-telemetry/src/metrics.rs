//! ## ratevakt-telemetry::metrics
//! **Prometheus counters for the rate pipeline**

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    /// Every packet pulled from the capture source.
    pub packets_seen: IntCounter,
    /// Packets with no usable source address.
    pub packets_ignored: IntCounter,
    /// Packets from whitelisted or already blocked sources.
    pub packets_exempt: IntCounter,
    pub packets_counted: IntCounter,
    pub windows_evaluated: IntCounter,
    pub block_decisions: IntCounter,
    pub enforcement_failures: IntCounter,
    /// Distinct sources in the most recently closed window.
    pub window_sources: IntGauge,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let packets_seen = IntCounter::new("ratevakt_packets_total", "Packets read from capture")?;
        let packets_ignored = IntCounter::new(
            "ratevakt_packets_ignored_total",
            "Packets without an IPv4 source address",
        )?;
        let packets_exempt = IntCounter::new(
            "ratevakt_packets_exempt_total",
            "Packets from whitelisted or blocked sources",
        )?;
        let packets_counted = IntCounter::new(
            "ratevakt_packets_counted_total",
            "Packets added to the rate window",
        )?;
        let windows_evaluated =
            IntCounter::new("ratevakt_windows_total", "Rate windows evaluated")?;
        let block_decisions = IntCounter::new(
            "ratevakt_block_decisions_total",
            "Sources found over threshold",
        )?;
        let enforcement_failures = IntCounter::new(
            "ratevakt_enforcement_failures_total",
            "Block requests that failed",
        )?;
        let window_sources = IntGauge::new(
            "ratevakt_window_sources",
            "Distinct sources in the last closed window",
        )?;

        registry.register(Box::new(packets_seen.clone()))?;
        registry.register(Box::new(packets_ignored.clone()))?;
        registry.register(Box::new(packets_exempt.clone()))?;
        registry.register(Box::new(packets_counted.clone()))?;
        registry.register(Box::new(windows_evaluated.clone()))?;
        registry.register(Box::new(block_decisions.clone()))?;
        registry.register(Box::new(enforcement_failures.clone()))?;
        registry.register(Box::new(window_sources.clone()))?;

        Ok(Self {
            registry,
            packets_seen,
            packets_ignored,
            packets_exempt,
            packets_counted,
            windows_evaluated,
            block_decisions,
            enforcement_failures,
            window_sources,
        })
    }

    /// Text exposition of every registered metric.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
