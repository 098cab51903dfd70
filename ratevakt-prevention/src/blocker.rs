//! ## ratevakt-prevention::blocker
//! **Registry and enforcement gateway in one place**
//!
//! A block goes through three steps:
//! 1. install the firewall rule; on failure the source stays unblocked and is
//!    re-evaluated next window
//! 2. mark the source blocked in memory, which removes it from accounting
//! 3. append it to the blocked log; on failure the source stays blocked and is
//!    queued for another write attempt on the next block call or [`Blocker::flush`]

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use ratevakt_core::SourceId;
use ratevakt_detection::ExemptionRegistry;
use ratevakt_telemetry::EventLogger;
use tracing::{debug, error, info, warn};

use crate::firewall::FirewallBackend;
use crate::gateway::{EnforcementError, EnforcementGateway};
use crate::registry::{BlockedLog, RegistryError, Whitelist};

pub struct Blocker {
    whitelist: Whitelist,
    blocked: RwLock<HashSet<SourceId>>,
    /// Blocked but not yet written to the log.
    pending: Mutex<Vec<SourceId>>,
    log: BlockedLog,
    firewall: Box<dyn FirewallBackend>,
    /// Serialises block calls so a source is never installed twice.
    serial: tokio::sync::Mutex<()>,
}

impl Blocker {
    /// Builds a blocker, restoring the blocked set from `log`.
    pub fn new(
        whitelist: Whitelist,
        log: BlockedLog,
        firewall: Box<dyn FirewallBackend>,
    ) -> Result<Self, RegistryError> {
        let blocked = log.load()?;
        info!(
            "Blocker ready: {} whitelist entries, {} previously blocked, backend {}",
            whitelist.len(),
            blocked.len(),
            firewall.name()
        );
        Ok(Self {
            whitelist,
            blocked: RwLock::new(blocked),
            pending: Mutex::new(Vec::new()),
            log,
            firewall,
            serial: tokio::sync::Mutex::new(()),
        })
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.read().len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Retries writing blocked sources whose log append failed earlier.
    pub async fn flush(&self) -> Result<(), EnforcementError> {
        let _serial = self.serial.lock().await;
        self.persist_pending().await
    }

    async fn persist_pending(&self) -> Result<(), EnforcementError> {
        let queued = std::mem::take(&mut *self.pending.lock());
        let mut remaining = queued.into_iter();

        while let Some(id) = remaining.next() {
            if let Err(e) = self.log.append(&id).await {
                let reason = e.to_string();
                let mut pending = self.pending.lock();
                pending.push(id.clone());
                pending.extend(remaining);
                return Err(EnforcementError::Persist { id, reason });
            }
            debug!("Persisted previously queued block for {id}");
        }
        Ok(())
    }
}

impl ExemptionRegistry for Blocker {
    fn is_whitelisted(&self, id: &SourceId) -> bool {
        self.whitelist.contains(id)
    }

    fn is_blocked(&self, id: &SourceId) -> bool {
        self.blocked.read().contains(id)
    }
}

#[async_trait]
impl EnforcementGateway for Blocker {
    async fn block(&self, id: &SourceId) -> Result<(), EnforcementError> {
        let _serial = self.serial.lock().await;

        if let Err(e) = self.persist_pending().await {
            warn!("Blocked list still not writable: {e}");
        }

        if self.whitelist.contains(id) {
            debug!("Not blocking whitelisted {id}");
            return Ok(());
        }
        if self.is_blocked(id) {
            return Ok(());
        }

        info!("Blocking {id}");
        if let Err(e) = self.firewall.block(id).await {
            EventLogger::log_event(
                "firewall_error",
                &[("ip_address", id.to_string()), ("error", e.to_string())],
            );
            return Err(e.into());
        }

        self.blocked.write().insert(id.clone());
        EventLogger::log_event(
            "firewall_block",
            &[
                ("ip_address", id.to_string()),
                ("backend", self.firewall.name().to_string()),
            ],
        );

        if let Err(e) = self.log.append(id).await {
            error!("Failed to record {id} in blocked list: {e}");
            self.pending.lock().push(id.clone());
            return Err(EnforcementError::Persist {
                id: id.clone(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }
}
