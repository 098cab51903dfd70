//! ## ratevakt-engine::scheduler
//! **Periodic window evaluation**
//!
//! Every tick closes the current window, turns it into block decisions and
//! hands each one to the enforcement gateway. A failed block is logged and
//! counted; the rest of the tick and later ticks carry on.
//!
//! Two signals end the loop. A stop request discards the open window. The
//! capture source running out evaluates the open window once more first, so
//! a finite capture shorter than one window is still enforced.

use std::sync::Arc;

use ratevakt_core::ThresholdPolicy;
use ratevakt_detection::{evaluate, ExemptionFilter, RateAggregator};
use ratevakt_prevention::{EnforcementError, EnforcementGateway};
use ratevakt_telemetry::MetricsRecorder;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::ticker::Ticker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    /// Winding down; an in-flight or last evaluation is still finishing.
    Stopping,
    Stopped,
}

/// Outcome of one evaluated window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowReport {
    pub sources: usize,
    pub packets: u64,
    pub decisions: usize,
    pub failures: usize,
    /// Blocks that are live but missing from the blocked list.
    pub unrecorded: usize,
}

pub struct WindowScheduler {
    aggregator: Arc<RateAggregator>,
    policy: ThresholdPolicy,
    filter: ExemptionFilter,
    gateway: Arc<dyn EnforcementGateway>,
    metrics: MetricsRecorder,
    state: watch::Sender<SchedulerState>,
}

impl WindowScheduler {
    pub fn new(
        aggregator: Arc<RateAggregator>,
        policy: ThresholdPolicy,
        filter: ExemptionFilter,
        gateway: Arc<dyn EnforcementGateway>,
        metrics: MetricsRecorder,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Running);
        Self {
            aggregator,
            policy,
            filter,
            gateway,
            metrics,
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Evaluates one window per tick until `cancel` fires, `source_ended`
    /// fires or the ticker runs dry. `source_ended` evaluates the open window
    /// before stopping; `cancel` does not.
    pub async fn run<T: Ticker>(
        self,
        mut ticker: T,
        cancel: CancellationToken,
        source_ended: CancellationToken,
    ) {
        info!(
            "Window scheduler running: threshold {} per {:?}",
            self.policy.threshold(),
            self.policy.window()
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = source_ended.cancelled() => {
                    self.state.send_replace(SchedulerState::Stopping);
                    debug!("Capture source ended, evaluating the last window");
                    self.evaluate_window().await;
                    break;
                }
                ticked = ticker.tick() => {
                    if !ticked {
                        debug!("Ticker closed");
                        break;
                    }
                    let evaluation = self.evaluate_window();
                    tokio::pin!(evaluation);
                    tokio::select! {
                        _ = &mut evaluation => {}
                        _ = cancel.cancelled() => {
                            self.state.send_replace(SchedulerState::Stopping);
                            evaluation.await;
                            break;
                        }
                    }
                }
            }
        }

        self.state.send_replace(SchedulerState::Stopping);
        self.state.send_replace(SchedulerState::Stopped);
        info!("Window scheduler stopped");
    }

    /// Closes the current window and enforces every decision it yields.
    #[instrument(level = "debug", name = "evaluate_window", skip(self))]
    pub async fn evaluate_window(&self) -> WindowReport {
        let snapshot = self.aggregator.snapshot_and_reset();
        let decisions = evaluate(&snapshot, &self.policy, &self.filter);

        self.metrics.windows_evaluated.inc();
        self.metrics.window_sources.set(snapshot.len() as i64);

        let mut report = WindowReport {
            sources: snapshot.len(),
            packets: snapshot.total(),
            decisions: decisions.len(),
            ..Default::default()
        };
        debug!(
            sources = report.sources,
            packets = report.packets,
            decisions = report.decisions,
            "Window closed"
        );

        for decision in decisions {
            self.metrics.block_decisions.inc();
            warn!(
                "{} sent {} packets in one window (threshold {})",
                decision.source,
                decision.count,
                self.policy.threshold()
            );
            match self.gateway.block(&decision.source).await {
                Ok(()) => {}
                Err(e @ EnforcementError::Persist { .. }) => {
                    report.unrecorded += 1;
                    warn!("{e}");
                }
                Err(e) => {
                    self.metrics.enforcement_failures.inc();
                    report.failures += 1;
                    error!("Failed to block {}: {e}", decision.source);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ticker::ManualTicker;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use ratevakt_core::SourceId;
    use ratevakt_detection::MemoryRegistry;
    use ratevakt_prevention::FirewallError;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tracing_test::traced_test;

    /// Records every call; fails for one configured id.
    struct FlakyGateway {
        registry: Arc<MemoryRegistry>,
        fail_for: Option<SourceId>,
        calls: Mutex<Vec<SourceId>>,
    }

    #[async_trait]
    impl EnforcementGateway for FlakyGateway {
        async fn block(&self, id: &SourceId) -> Result<(), EnforcementError> {
            self.calls.lock().push(id.clone());
            if self.fail_for.as_ref() == Some(id) {
                return Err(FirewallError::InvalidAddress(id.clone()).into());
            }
            self.registry.mark_blocked(id.clone());
            Ok(())
        }
    }

    fn scheduler(
        threshold: u64,
        fail_for: Option<&str>,
    ) -> (WindowScheduler, Arc<RateAggregator>, Arc<FlakyGateway>) {
        let registry = Arc::new(MemoryRegistry::default());
        let gateway = Arc::new(FlakyGateway {
            registry: registry.clone(),
            fail_for: fail_for.map(SourceId::from),
            calls: Mutex::new(Vec::new()),
        });
        let aggregator = Arc::new(RateAggregator::default());
        let policy = ThresholdPolicy::new(threshold, Duration::from_secs(1)).unwrap();
        let scheduler = WindowScheduler::new(
            aggregator.clone(),
            policy,
            ExemptionFilter::new(registry),
            gateway.clone(),
            MetricsRecorder::new().unwrap(),
        );
        (scheduler, aggregator, gateway)
    }

    fn feed(aggregator: &RateAggregator, id: &str, n: u64) {
        let id = SourceId::from(id);
        for _ in 0..n {
            aggregator.increment(&id);
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn failure_for_one_source_does_not_stop_the_others() {
        let (scheduler, aggregator, gateway) = scheduler(10, Some("10.0.0.1"));
        feed(&aggregator, "10.0.0.1", 30);
        feed(&aggregator, "10.0.0.2", 20);
        feed(&aggregator, "10.0.0.3", 5);

        let report = scheduler.evaluate_window().await;
        assert_eq!(
            report,
            WindowReport {
                sources: 3,
                packets: 55,
                decisions: 2,
                failures: 1,
                unrecorded: 0,
            }
        );
        let calls = gateway.calls.lock().clone();
        assert_eq!(calls, vec![SourceId::from("10.0.0.1"), SourceId::from("10.0.0.2")]);
        assert_eq!(scheduler.metrics.enforcement_failures.get(), 1);
        assert!(logs_contain("Failed to block 10.0.0.1"));
        assert!(aggregator.is_empty());
    }

    #[tokio::test]
    async fn failed_source_is_retried_next_window() {
        let (scheduler, aggregator, gateway) = scheduler(10, Some("10.0.0.1"));
        feed(&aggregator, "10.0.0.1", 11);
        scheduler.evaluate_window().await;
        feed(&aggregator, "10.0.0.1", 11);
        scheduler.evaluate_window().await;
        assert_eq!(gateway.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn blocked_source_is_not_resubmitted() {
        let (scheduler, aggregator, gateway) = scheduler(10, None);
        feed(&aggregator, "10.0.0.1", 11);
        scheduler.evaluate_window().await;
        // Counted before the block landed; evaluation re-checks exemption.
        feed(&aggregator, "10.0.0.1", 11);
        let report = scheduler.evaluate_window().await;
        assert_eq!(report.decisions, 0);
        assert_eq!(gateway.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn runs_ticks_until_cancelled() {
        let (scheduler, aggregator, gateway) = scheduler(1, None);
        let mut state = scheduler.subscribe();
        let (ticker, ticks) = ManualTicker::new();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(ticker, cancel.clone(), CancellationToken::new()));

        feed(&aggregator, "10.0.0.1", 2);
        ticks.tick().await;
        assert_eq!(gateway.calls.lock().len(), 1);
        assert_eq!(*state.borrow(), SchedulerState::Running);

        cancel.cancel();
        task.await.unwrap();
        state
            .wait_for(|s| *s == SchedulerState::Stopped)
            .await
            .unwrap();

        // No ticks are processed once stopped.
        feed(&aggregator, "10.0.0.2", 5);
        ticks.tick().await;
        assert_eq!(gateway.calls.lock().len(), 1);
        assert_eq!(aggregator.total(), 5);
    }

    #[tokio::test]
    async fn closed_ticker_stops_the_scheduler() {
        let (scheduler, _aggregator, _gateway) = scheduler(1, None);
        let state = scheduler.subscribe();
        let (ticker, ticks) = ManualTicker::new();
        drop(ticks);
        scheduler
            .run(ticker, CancellationToken::new(), CancellationToken::new())
            .await;
        assert_eq!(*state.borrow(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn source_end_evaluates_the_open_window() {
        let (scheduler, aggregator, gateway) = scheduler(1, None);
        let state = scheduler.subscribe();
        let (ticker, _ticks) = ManualTicker::new();
        let ended = CancellationToken::new();

        feed(&aggregator, "10.0.0.1", 2);
        ended.cancel();
        scheduler
            .run(ticker, CancellationToken::new(), ended)
            .await;

        assert_eq!(*gateway.calls.lock(), vec![SourceId::from("10.0.0.1")]);
        assert!(aggregator.is_empty());
        assert_eq!(*state.borrow(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn stop_request_discards_the_open_window() {
        let (scheduler, aggregator, gateway) = scheduler(1, None);
        let (ticker, _ticks) = ManualTicker::new();
        let cancel = CancellationToken::new();
        let ended = CancellationToken::new();

        feed(&aggregator, "10.0.0.1", 2);
        cancel.cancel();
        ended.cancel();
        scheduler.run(ticker, cancel, ended).await;

        assert!(gateway.calls.lock().is_empty());
        assert_eq!(aggregator.total(), 2);
    }

    /// Parks every block call until released.
    struct ParkedGateway {
        entered: Notify,
        release: Notify,
        completed: Mutex<Vec<SourceId>>,
    }

    #[async_trait]
    impl EnforcementGateway for ParkedGateway {
        async fn block(&self, id: &SourceId) -> Result<(), EnforcementError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.completed.lock().push(id.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn stop_during_evaluation_lets_the_block_finish() {
        let gateway = Arc::new(ParkedGateway {
            entered: Notify::new(),
            release: Notify::new(),
            completed: Mutex::new(Vec::new()),
        });
        let aggregator = Arc::new(RateAggregator::default());
        let scheduler = WindowScheduler::new(
            aggregator.clone(),
            ThresholdPolicy::new(1, Duration::from_secs(1)).unwrap(),
            ExemptionFilter::new(Arc::new(MemoryRegistry::default())),
            gateway.clone(),
            MetricsRecorder::new().unwrap(),
        );
        let mut state = scheduler.subscribe();
        let (ticker, ticks) = ManualTicker::new();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(ticker, cancel.clone(), CancellationToken::new()));

        feed(&aggregator, "10.0.0.1", 2);
        let tick = tokio::spawn(async move { ticks.tick().await });
        gateway.entered.notified().await;

        cancel.cancel();
        state
            .wait_for(|s| *s == SchedulerState::Stopping)
            .await
            .unwrap();
        assert!(gateway.completed.lock().is_empty());
        assert!(!task.is_finished());

        gateway.release.notify_one();
        task.await.unwrap();
        tick.await.unwrap();
        assert_eq!(*gateway.completed.lock(), vec![SourceId::from("10.0.0.1")]);
        assert_eq!(*state.borrow(), SchedulerState::Stopped);
    }

    /// Installs the rule but cannot record it.
    struct UnrecordedGateway {
        registry: Arc<MemoryRegistry>,
    }

    #[async_trait]
    impl EnforcementGateway for UnrecordedGateway {
        async fn block(&self, id: &SourceId) -> Result<(), EnforcementError> {
            self.registry.mark_blocked(id.clone());
            Err(EnforcementError::Persist {
                id: id.clone(),
                reason: "read-only file system".into(),
            })
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn unrecorded_block_is_not_an_enforcement_failure() {
        let registry = Arc::new(MemoryRegistry::default());
        let aggregator = Arc::new(RateAggregator::default());
        let metrics = MetricsRecorder::new().unwrap();
        let scheduler = WindowScheduler::new(
            aggregator.clone(),
            ThresholdPolicy::new(1, Duration::from_secs(1)).unwrap(),
            ExemptionFilter::new(registry.clone()),
            Arc::new(UnrecordedGateway { registry }),
            metrics.clone(),
        );
        feed(&aggregator, "10.0.0.1", 2);

        let report = scheduler.evaluate_window().await;
        assert_eq!(report.failures, 0);
        assert_eq!(report.unrecorded, 1);
        assert_eq!(metrics.enforcement_failures.get(), 0);
        assert!(!logs_contain("Failed to block"));
        assert!(logs_contain("failed to persist"));
    }
}
