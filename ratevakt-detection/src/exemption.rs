//! Exemption filtering ahead of accounting.
//!
//! Whitelisted and already blocked sources are dropped before they reach the
//! aggregator, so they never show up in a window.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use ratevakt_core::SourceId;

/// Read-only view of the allow/block registry. Both lookups run on the
/// ingestion hot path and must not block on I/O.
pub trait ExemptionRegistry: Send + Sync {
    fn is_whitelisted(&self, id: &SourceId) -> bool;

    fn is_blocked(&self, id: &SourceId) -> bool;
}

#[derive(Clone)]
pub struct ExemptionFilter {
    registry: Arc<dyn ExemptionRegistry>,
}

impl ExemptionFilter {
    pub fn new(registry: Arc<dyn ExemptionRegistry>) -> Self {
        Self { registry }
    }

    /// `false` for whitelisted or already blocked sources.
    #[inline]
    pub fn should_count(&self, id: &SourceId) -> bool {
        !(self.registry.is_whitelisted(id) || self.registry.is_blocked(id))
    }
}

/// In-memory registry for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    whitelist: HashSet<SourceId>,
    blocked: RwLock<HashSet<SourceId>>,
}

impl MemoryRegistry {
    pub fn with_whitelist<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SourceId>,
    {
        Self {
            whitelist: ids.into_iter().map(Into::into).collect(),
            blocked: RwLock::default(),
        }
    }

    /// Returns `true` if the id was not blocked before.
    pub fn mark_blocked(&self, id: SourceId) -> bool {
        self.blocked.write().insert(id)
    }

    pub fn blocked(&self) -> Vec<SourceId> {
        let mut ids: Vec<_> = self.blocked.read().iter().cloned().collect();
        ids.sort();
        ids
    }
}

impl ExemptionRegistry for MemoryRegistry {
    fn is_whitelisted(&self, id: &SourceId) -> bool {
        self.whitelist.contains(id)
    }

    fn is_blocked(&self, id: &SourceId) -> bool {
        self.blocked.read().contains(id)
    }
}
