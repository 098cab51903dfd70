use ratevakt_capture::CaptureError;
use ratevakt_config::ConfigError;
use ratevakt_core::PolicyError;
use ratevakt_prevention::RegistryError;
use thiserror::Error;
use tokio::task::JoinError;

/// Failures that stop the monitor from starting, or end it abnormally.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid rate policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("{task} task failed: {reason}")]
    Task { task: &'static str, reason: String },
}

impl EngineError {
    pub(crate) fn task(task: &'static str, err: JoinError) -> Self {
        EngineError::Task {
            task,
            reason: err.to_string(),
        }
    }
}
