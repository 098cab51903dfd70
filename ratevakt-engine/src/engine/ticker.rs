//! Window boundaries.
//!
//! The scheduler only needs "wait for the next boundary", so tests can drive
//! it tick by tick with [`ManualTicker`] instead of waiting on the wall clock.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

#[async_trait]
pub trait Ticker: Send {
    /// Resolves at the next window boundary. `false` means no further ticks
    /// will ever arrive. Must be cancel-safe.
    async fn tick(&mut self) -> bool;
}

/// Fixed-period ticker on the tokio clock. The first tick fires one full
/// period after creation.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        // A late evaluation shifts later boundaries instead of bursting.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticker fired by hand through a [`TickHandle`].
#[derive(Debug)]
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
    in_flight: Option<oneshot::Sender<()>>,
}

/// Fires ticks on a [`ManualTicker`].
#[derive(Debug, Clone)]
pub struct TickHandle {
    tx: mpsc::UnboundedSender<oneshot::Sender<()>>,
}

impl ManualTicker {
    pub fn new() -> (Self, TickHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx,
                in_flight: None,
            },
            TickHandle { tx },
        )
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        // Asking for the next tick means the previous one was fully handled.
        if let Some(done) = self.in_flight.take() {
            let _ = done.send(());
        }
        match self.rx.recv().await {
            Some(done) => {
                self.in_flight = Some(done);
                true
            }
            None => false,
        }
    }
}

impl TickHandle {
    /// Fires one tick and waits until the scheduler has finished with it or
    /// has stopped.
    pub async fn tick(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(done_tx).is_ok() {
            let _ = done_rx.await;
        }
    }
}
