//! # ratevakt Prevention
//!
//! Everything that acts on a block decision: the firewall backends, the
//! allow/block registry and the [`Blocker`] that ties them together behind
//! the [`EnforcementGateway`] capability.

pub mod blocker;
pub mod firewall;
pub mod gateway;
pub mod registry;

pub use blocker::Blocker;
pub use firewall::{DryRun, FirewallBackend, FirewallError, Iptables};
pub use gateway::{EnforcementError, EnforcementGateway};
pub use registry::{BlockedLog, RegistryError, Whitelist};
