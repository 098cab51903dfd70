//! ## ratevakt-engine::monitor
//! **Coordinator for the ingestion loop and the window scheduler**
//!
//! [`Monitor::start`] acquires the capture source, then spawns:
//! - the ingestion loop on a blocking thread (capture reads block)
//! - the scheduler as an async task
//!
//! Both observe one [`CancellationToken`] for stop requests. When ingestion
//! ends by itself it fires a second token instead; the scheduler evaluates
//! the open window one last time and stops. The capture source is only
//! dropped after both tasks have been joined.

use std::sync::Arc;

use ratevakt_capture::{CaptureError, PacketSource};
use ratevakt_core::{Clock, SystemClock, ThresholdPolicy};
use ratevakt_detection::{ExemptionFilter, ExemptionRegistry, RateAggregator};
use ratevakt_prevention::EnforcementGateway;
use ratevakt_telemetry::MetricsRecorder;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use super::error::EngineError;
use super::ingest::{IngestExit, IngestLoop};
use super::scheduler::{SchedulerState, WindowScheduler};
use super::ticker::{IntervalTicker, Ticker};

type IngestTask = JoinHandle<(Box<dyn PacketSource>, IngestExit)>;

/// Rate monitor wiring, ready to start.
pub struct Monitor {
    policy: ThresholdPolicy,
    registry: Arc<dyn ExemptionRegistry>,
    gateway: Arc<dyn EnforcementGateway>,
    metrics: MetricsRecorder,
    clock: Arc<dyn Clock>,
}

impl Monitor {
    pub fn new(
        policy: ThresholdPolicy,
        registry: Arc<dyn ExemptionRegistry>,
        gateway: Arc<dyn EnforcementGateway>,
        metrics: MetricsRecorder,
    ) -> Self {
        Self {
            policy,
            registry,
            gateway,
            metrics,
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock used to timestamp windows.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Starts with a wall-clock ticker firing once per policy window.
    pub fn start<S, F>(self, open: F) -> Result<MonitorHandle, EngineError>
    where
        S: PacketSource + 'static,
        F: FnOnce() -> Result<S, CaptureError>,
    {
        let ticker = IntervalTicker::new(self.policy.window());
        self.start_with_ticker(open, ticker)
    }

    /// Opens the capture source with `open` and spawns both tasks. A source
    /// that cannot be opened is returned as an error and nothing is spawned.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_with_ticker<S, F, T>(
        self,
        open: F,
        ticker: T,
    ) -> Result<MonitorHandle, EngineError>
    where
        S: PacketSource + 'static,
        F: FnOnce() -> Result<S, CaptureError>,
        T: Ticker + 'static,
    {
        let mut source: Box<dyn PacketSource> = Box::new(open()?);

        let aggregator = Arc::new(RateAggregator::new(self.clock));
        let filter = ExemptionFilter::new(self.registry);
        let cancel = CancellationToken::new();
        let capture_ended = CancellationToken::new();

        let scheduler = WindowScheduler::new(
            aggregator.clone(),
            self.policy,
            filter.clone(),
            self.gateway,
            self.metrics.clone(),
        );
        let state = scheduler.subscribe();
        let scheduler_task = tokio::spawn(
            scheduler
                .run(ticker, cancel.clone(), capture_ended.clone())
                .instrument(tracing::info_span!("scheduler_task")),
        );

        let ingest = IngestLoop::new(aggregator.clone(), filter, self.metrics);
        let ingest_cancel = cancel.clone();
        let ingest_ended = capture_ended.clone();
        let ingest_task = tokio::task::spawn_blocking(move || {
            let span = tracing::info_span!("ingest_task");
            let _entered = span.enter();
            info!("Ingestion started");
            let exit = ingest.run(source.as_mut(), &ingest_cancel);
            ingest_ended.cancel();
            info!("Ingestion finished: {exit:?}");
            (source, exit)
        });

        Ok(MonitorHandle {
            cancel,
            capture_ended,
            ingest_task,
            scheduler_task,
            state,
            aggregator,
        })
    }
}

/// Running monitor.
pub struct MonitorHandle {
    cancel: CancellationToken,
    capture_ended: CancellationToken,
    ingest_task: IngestTask,
    scheduler_task: JoinHandle<()>,
    state: watch::Receiver<SchedulerState>,
    aggregator: Arc<RateAggregator>,
}

impl MonitorHandle {
    /// Stop token shared by both tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancelled once ingestion has returned, for whatever reason.
    pub fn capture_ended(&self) -> CancellationToken {
        self.capture_ended.clone()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// The live counting window.
    pub fn aggregator(&self) -> &Arc<RateAggregator> {
        &self.aggregator
    }

    /// Signals both tasks to stop and waits for them. The open window is
    /// discarded.
    pub async fn stop(self) -> Result<IngestExit, EngineError> {
        info!("Stopping monitor");
        self.cancel.cancel();
        self.wait().await
    }

    /// Waits for both tasks without signalling them. Returns once ingestion
    /// has ended (end of stream, capture failure or cancellation) and the
    /// scheduler has evaluated the last window and stopped.
    pub async fn wait(self) -> Result<IngestExit, EngineError> {
        let ingest = self.ingest_task.await;
        // Also covers an ingestion thread that panicked before signalling.
        self.capture_ended.cancel();
        let scheduler = self.scheduler_task.await;

        scheduler.map_err(|e| EngineError::task("scheduler", e))?;
        let (source, exit) = ingest.map_err(|e| EngineError::task("ingest", e))?;

        drop(source);
        debug!("Capture source released");
        Ok(exit)
    }
}
