//! Ingestion loop: capture → classify → exemption filter → aggregator.
//!
//! Runs on a blocking thread. A read timeout only gives the loop a chance to
//! look at the cancellation token.

use std::sync::Arc;

use ratevakt_capture::{classify, CaptureError, Packet, PacketSource};
use ratevakt_detection::{ExemptionFilter, RateAggregator};
use ratevakt_telemetry::MetricsRecorder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Why the ingestion loop returned.
#[derive(Debug)]
pub enum IngestExit {
    Cancelled,
    EndOfStream,
    /// The capture source failed in a way that cannot be retried.
    Failed(CaptureError),
}

#[derive(Clone)]
pub struct IngestLoop {
    aggregator: Arc<RateAggregator>,
    filter: ExemptionFilter,
    metrics: MetricsRecorder,
}

impl IngestLoop {
    pub fn new(
        aggregator: Arc<RateAggregator>,
        filter: ExemptionFilter,
        metrics: MetricsRecorder,
    ) -> Self {
        Self {
            aggregator,
            filter,
            metrics,
        }
    }

    /// Reads until the source ends, fails, or `cancel` fires.
    pub fn run(&self, source: &mut dyn PacketSource, cancel: &CancellationToken) -> IngestExit {
        while !cancel.is_cancelled() {
            match source.next_packet() {
                Ok(Some(packet)) => self.ingest(&packet),
                Ok(None) => {
                    debug!("Capture source reached end of stream");
                    return IngestExit::EndOfStream;
                }
                Err(e) if e.is_transient() => continue,
                Err(e) => {
                    error!("Capture failed: {e}");
                    return IngestExit::Failed(e);
                }
            }
        }
        IngestExit::Cancelled
    }

    #[inline]
    fn ingest(&self, packet: &Packet) {
        self.metrics.packets_seen.inc();
        let Some(id) = classify(packet) else {
            self.metrics.packets_ignored.inc();
            return;
        };
        if !self.filter.should_count(&id) {
            self.metrics.packets_exempt.inc();
            return;
        }
        self.aggregator.increment(&id);
        self.metrics.packets_counted.inc();
    }
}
