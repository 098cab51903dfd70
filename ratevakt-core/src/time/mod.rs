//! ## ratevakt-core::time
//! **Clock abstraction for window timestamps**
//!
//! `SystemClock` reads wall-clock time. `VirtualClock` is advanced by hand so
//! window boundaries are deterministic in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" in nanoseconds.
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> u64;
}

/// Wall clock, nanoseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        // A clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    offset: Arc<AtomicU64>, // Nanoseconds
}

impl VirtualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            offset: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    #[inline]
    pub fn advance(&self, ns: u64) {
        self.offset.fetch_add(ns, Ordering::Release);
    }
}

impl Clock for VirtualClock {
    #[inline]
    fn now_ns(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }
}
