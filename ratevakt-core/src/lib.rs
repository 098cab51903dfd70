//! # ratevakt-core
//!
//! Foundation types shared by every ratevakt component.
//!
//! ### Key Submodules:
//! - `types`: source identifiers, threshold policy and block decisions
//! - `time`: `Clock` abstraction with a system and a virtual implementation
//! - `error`: policy construction errors

pub mod error;
pub mod time;
pub mod types;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::time::*;
    pub use crate::types::*;
}

pub use error::PolicyError;
pub use time::{Clock, SystemClock, VirtualClock};
pub use types::{BlockDecision, SourceId, ThresholdPolicy};
