//! ## ratevakt-prevention::firewall
//! **Rule installation for blocked sources**
//!
//! `Iptables` appends a DROP rule per source. `DryRun` only records what it
//! would have blocked.

use std::io;
use std::net::IpAddr;
use std::process::ExitStatus;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use ratevakt_core::SourceId;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("Refusing to block '{0}': not an IP address")]
    InvalidAddress(SourceId),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

#[async_trait]
pub trait FirewallBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Installs a rule dropping all traffic from `id`.
    async fn block(&self, id: &SourceId) -> Result<(), FirewallError>;
}

#[async_trait]
impl<T: FirewallBackend + ?Sized> FirewallBackend for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn block(&self, id: &SourceId) -> Result<(), FirewallError> {
        (**self).block(id).await
    }
}

/// `iptables -A <chain> -s <ip> -j DROP`
#[derive(Debug, Clone)]
pub struct Iptables {
    program: String,
    chain: String,
}

impl Iptables {
    pub fn new(chain: impl Into<String>) -> Self {
        Self::with_program("iptables", chain)
    }

    /// Uses a different executable, e.g. `ip6tables` or a wrapper script.
    pub fn with_program(program: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            chain: chain.into(),
        }
    }
}

#[async_trait]
impl FirewallBackend for Iptables {
    fn name(&self) -> &str {
        "iptables"
    }

    async fn block(&self, id: &SourceId) -> Result<(), FirewallError> {
        // Only ever pass a parsed address to the command line.
        let ip: IpAddr = id
            .ip()
            .ok_or_else(|| FirewallError::InvalidAddress(id.clone()))?;
        let ip = ip.to_string();

        debug!("{} -A {} -s {ip} -j DROP", self.program, self.chain);
        let output = Command::new(&self.program)
            .args(["-A", self.chain.as_str(), "-s", ip.as_str(), "-j", "DROP"])
            .output()
            .await
            .map_err(|source| FirewallError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FirewallError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Records block requests without touching the host firewall.
#[derive(Debug, Default)]
pub struct DryRun {
    blocked: Mutex<Vec<SourceId>>,
}

impl DryRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocked(&self) -> Vec<SourceId> {
        self.blocked.lock().clone()
    }
}

#[async_trait]
impl FirewallBackend for DryRun {
    fn name(&self) -> &str {
        "dry_run"
    }

    async fn block(&self, id: &SourceId) -> Result<(), FirewallError> {
        info!("[dry-run] would block {id}");
        self.blocked.lock().push(id.clone());
        Ok(())
    }
}
