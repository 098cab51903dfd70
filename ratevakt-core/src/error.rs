use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Window duration must be greater than zero")]
    ZeroWindow,
}
