//! ## ratevakt-telemetry::logging
//! **Structured logging with tracing**
//!
//! `RUST_LOG` takes precedence over the configured level so operators can
//! raise verbosity without touching the config file.

use tracing::info_span;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Returns an error if one is already set.
    pub fn init(level: &str, json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let builder = fmt().with_env_filter(filter).with_thread_names(true);

        if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        }
    }

    /// Emits a security event (block, block failure) inside its own span.
    pub fn log_event(event_type: &str, metadata: &[(&str, String)]) {
        let span = info_span!("security_event", event_type = event_type);
        let _entered = span.enter();
        tracing::info!(metadata = ?metadata, "Security event occurred");
    }
}
