//! Prevention parameters: registry files, whitelist ranges and the firewall.

use std::path::PathBuf;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct PreventionConfig {
    /// One identifier per line. Missing file means an empty whitelist.
    #[serde(default = "default_whitelist_file")]
    pub whitelist_file: Option<PathBuf>,

    /// Blocked identifiers, read at startup and appended on every block.
    /// `None` keeps blocked state in memory only.
    #[serde(default = "default_blocked_file")]
    pub blocked_file: Option<PathBuf>,

    /// Whitelisted IP ranges.
    #[validate(custom(function = validation::validate_cidr_list))]
    #[serde(default)]
    pub whitelist: Vec<IpNetwork>,

    #[validate(nested)]
    #[serde(default)]
    pub firewall: FirewallConfig,
}

fn default_whitelist_file() -> Option<PathBuf> {
    Some(PathBuf::from("/tmp/whitelist_ips.txt"))
}

fn default_blocked_file() -> Option<PathBuf> {
    Some(PathBuf::from("/tmp/blocked_ips.txt"))
}

impl Default for PreventionConfig {
    fn default() -> Self {
        Self {
            whitelist_file: default_whitelist_file(),
            blocked_file: default_blocked_file(),
            whitelist: Vec::new(),
            firewall: FirewallConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FirewallBackendKind {
    #[default]
    Iptables,
    DryRun,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct FirewallConfig {
    #[serde(default)]
    pub backend: FirewallBackendKind,

    /// Chain the DROP rules are appended to.
    #[validate(custom(function = validation::validate_chain))]
    #[serde(default = "default_chain")]
    pub chain: String,
}

fn default_chain() -> String {
    "INPUT".into()
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            backend: FirewallBackendKind::default(),
            chain: default_chain(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_whitelist() {
        let mut config = PreventionConfig::default();
        config.whitelist.push("192.168.1.0/24".parse().unwrap());
        config.validate().expect("Valid whitelist should pass");
    }

    #[test]
    fn catch_all_whitelist_rejected() {
        let mut config = PreventionConfig::default();
        config.whitelist.push("0.0.0.0/0".parse().unwrap());
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_chain_rejected() {
        let mut config = PreventionConfig::default();
        config.firewall.chain = "INPUT -j ACCEPT".into();
        assert!(config.validate().is_err());
    }
}
