//! Live capture parameters.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Network interface for live capture.
    #[validate(custom(function = validation::validate_interface))]
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Bytes kept per packet. Only the link and IP headers are needed.
    #[validate(range(min = 64, max = 65535))]
    #[serde(default = "default_snapshot_len")]
    pub snapshot_len: i32,

    #[serde(default = "default_promiscuous")]
    pub promiscuous: bool,

    /// Upper bound on a single blocking read, so shutdown is noticed promptly.
    #[validate(range(min = 1, max = 60000))]
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: i32,

    /// Only count traffic to/from this port. 0 captures everything.
    #[serde(default)]
    pub port: u16,
}

fn default_interface() -> String {
    "eth0".into()
}

fn default_snapshot_len() -> i32 {
    1024
}

fn default_promiscuous() -> bool {
    true
}

fn default_read_timeout() -> i32 {
    100
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            snapshot_len: default_snapshot_len(),
            promiscuous: default_promiscuous(),
            read_timeout_ms: default_read_timeout(),
            port: 0,
        }
    }
}
