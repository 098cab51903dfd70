//! Domain types for per-source rate accounting.

use std::borrow::Borrow;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use crate::error::PolicyError;

/// Textual network address that keys rate accounting.
///
/// Equality is exact string equality. Clones share the underlying buffer, so
/// handing an id to the aggregator and to a decision costs a refcount bump.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Arc<str>);

impl SourceId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the identifier as an IP address, if it is one.
    pub fn ip(&self) -> Option<IpAddr> {
        self.0.parse().ok()
    }
}

impl From<Ipv4Addr> for SourceId {
    fn from(addr: Ipv4Addr) -> Self {
        Self::new(addr.to_string())
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl Borrow<str> for SourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId({})", &self.0)
    }
}

/// Threshold and window length used by the scheduler.
///
/// A source is over threshold iff its count is strictly greater than
/// `threshold`. Meeting the threshold exactly is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdPolicy {
    threshold: u64,
    window: Duration,
}

impl ThresholdPolicy {
    pub fn new(threshold: u64, window: Duration) -> Result<Self, PolicyError> {
        if window.is_zero() {
            return Err(PolicyError::ZeroWindow);
        }
        Ok(Self { threshold, window })
    }

    #[inline]
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    #[inline]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[inline]
    pub fn exceeds(&self, count: u64) -> bool {
        count > self.threshold
    }
}

/// A source that exceeded the threshold during one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDecision {
    pub source: SourceId,
    /// Packets counted for `source` in the evaluated window.
    pub count: u64,
    /// Clock reading (nanoseconds) at which the window was closed.
    pub window_end_ns: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn rejects_zero_window() {
        assert_eq!(
            ThresholdPolicy::new(100, Duration::ZERO),
            Err(PolicyError::ZeroWindow)
        );
    }

    #[test]
    fn threshold_is_strict() {
        let policy = ThresholdPolicy::new(100, Duration::from_secs(1)).unwrap();
        assert!(!policy.exceeds(99));
        assert!(!policy.exceeds(100));
        assert!(policy.exceeds(101));
    }

    #[test]
    fn zero_threshold_blocks_any_traffic() {
        let policy = ThresholdPolicy::new(0, Duration::from_secs(1)).unwrap();
        assert!(!policy.exceeds(0));
        assert!(policy.exceeds(1));
    }

    #[test]
    fn source_id_from_ipv4() {
        let id = SourceId::from(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(id.as_str(), "10.0.0.1");
        assert_eq!(id.ip(), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
    }

    #[test]
    fn source_id_lookup_by_str() {
        let mut set = HashSet::new();
        set.insert(SourceId::from("192.168.1.7"));
        assert!(set.contains("192.168.1.7"));
        assert!(!set.contains("192.168.1.70"));
    }

    #[test]
    fn non_ip_identifier_has_no_address() {
        assert_eq!(SourceId::from("not-an-ip").ip(), None);
    }

    proptest! {
        #[test]
        fn exceeds_matches_strict_comparison(threshold in 0u64..10_000, count in 0u64..20_000) {
            let policy = ThresholdPolicy::new(threshold, Duration::from_millis(1)).unwrap();
            prop_assert_eq!(policy.exceeds(count), count > threshold);
        }
    }
}
