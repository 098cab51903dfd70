//! Shared validators used across configuration sections.

use ipnetwork::IpNetwork;
use validator::ValidationError;

/// Rejects unspecified (`0.0.0.0/x`, `::/x`) ranges, which would whitelist everything.
pub fn validate_cidr_list(cidrs: &[IpNetwork]) -> Result<(), ValidationError> {
    if cidrs.iter().any(|n| n.ip().is_unspecified()) {
        return Err(ValidationError::new("invalid_cidr"));
    }
    Ok(())
}

/// Linux interface names: 1..=15 chars of `[A-Za-z0-9_.-]`.
pub fn validate_interface(name: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^[a-zA-Z0-9_.-]{1,15}$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;

    if re.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_interface"))
    }
}

pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Firewall chains are passed to iptables as a single argument.
pub fn validate_chain(chain: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^[A-Za-z0-9_-]{1,28}$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(chain) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_chain"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_names() {
        assert!(validate_interface("eth0").is_ok());
        assert!(validate_interface("enp0s31f6").is_ok());
        assert!(validate_interface("br-lan.10").is_ok());
        assert!(validate_interface("").is_err());
        assert!(validate_interface("eth0; rm -rf /").is_err());
        assert!(validate_interface("averyveryverylongname").is_err());
    }

    #[test]
    fn unspecified_networks_are_rejected() {
        let ok: Vec<IpNetwork> = vec!["10.0.0.0/8".parse().unwrap()];
        let bad: Vec<IpNetwork> = vec!["0.0.0.0/0".parse().unwrap()];
        assert!(validate_cidr_list(&ok).is_ok());
        assert!(validate_cidr_list(&bad).is_err());
    }

    #[test]
    fn log_levels() {
        assert!(validate_log_level("INFO").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }

    #[test]
    fn chains() {
        assert!(validate_chain("INPUT").is_ok());
        assert!(validate_chain("RATEVAKT-DROP").is_ok());
        assert!(validate_chain("-F INPUT").is_err());
    }
}
