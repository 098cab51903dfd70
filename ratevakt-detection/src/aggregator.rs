//! ## ratevakt-detection::aggregator
//! **Per-source packet counts for the current window**
//!
//! One mutex covers both the read-modify-write of a count and the whole
//! window swap, so an increment lands either entirely before or entirely
//! after a snapshot. Hold time is a single map update or a pointer swap;
//! nothing else runs under the lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use ratevakt_core::{Clock, SourceId, SystemClock};

struct RateWindow {
    counts: HashMap<SourceId, u64>,
    started_ns: u64,
}

impl RateWindow {
    fn starting_at(started_ns: u64) -> Self {
        Self {
            counts: HashMap::new(),
            started_ns,
        }
    }
}

/// Contents of a closed window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSnapshot {
    counts: HashMap<SourceId, u64>,
    pub started_ns: u64,
    pub ended_ns: u64,
}

impl WindowSnapshot {
    pub fn count(&self, id: &str) -> u64 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    /// Number of distinct sources seen in the window.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Packets counted across all sources.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceId, u64)> {
        self.counts.iter().map(|(id, count)| (id, *count))
    }

    pub fn into_counts(self) -> HashMap<SourceId, u64> {
        self.counts
    }
}

/// Shared counting window, injected into both the ingestion loop and the
/// scheduler.
pub struct RateAggregator {
    window: Mutex<RateWindow>,
    clock: Arc<dyn Clock>,
}

impl Default for RateAggregator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl RateAggregator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let started_ns = clock.now_ns();
        Self {
            window: Mutex::new(RateWindow::starting_at(started_ns)),
            clock,
        }
    }

    /// Adds one to `id` in the current window.
    #[inline]
    pub fn increment(&self, id: &SourceId) {
        let mut window = self.window.lock();
        match window.counts.get_mut(id) {
            Some(count) => *count += 1,
            None => {
                window.counts.insert(id.clone(), 1);
            }
        }
    }

    /// Atomically captures the current window and replaces it with an empty
    /// one. Increments after this call belong to the next window.
    pub fn snapshot_and_reset(&self) -> WindowSnapshot {
        let now = self.clock.now_ns();
        let closed = {
            let mut window = self.window.lock();
            std::mem::replace(&mut *window, RateWindow::starting_at(now))
        };

        WindowSnapshot {
            counts: closed.counts,
            started_ns: closed.started_ns,
            ended_ns: now,
        }
    }

    pub fn count(&self, id: &str) -> u64 {
        self.window.lock().counts.get(id).copied().unwrap_or(0)
    }

    /// Distinct sources in the current window.
    pub fn len(&self) -> usize {
        self.window.lock().counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.lock().counts.is_empty()
    }

    /// Packets counted so far in the current window.
    pub fn total(&self) -> u64 {
        self.window.lock().counts.values().sum()
    }
}
