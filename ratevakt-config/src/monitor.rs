//! Rate threshold and evaluation window.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Packets a source may send per window. Exceeding it triggers a block.
    #[serde(default = "default_threshold")]
    pub threshold: u64,

    #[validate(range(min = 10, max = 3_600_000))]
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_threshold() -> u64 {
    100
}

fn default_window_ms() -> u64 {
    1000
}

impl MonitorConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            window_ms: default_window_ms(),
        }
    }
}
