//! # ratevakt Detection
//!
//! Per-source rate accounting and threshold evaluation.
//!
//! - `aggregator`: the shared counting window with atomic snapshot-and-reset
//! - `exemption`: whitelist / already-blocked filtering ahead of accounting
//! - `evaluate`: turns a closed window into block decisions

pub mod aggregator;
pub mod evaluate;
pub mod exemption;

pub use aggregator::{RateAggregator, WindowSnapshot};
pub use evaluate::evaluate;
pub use exemption::{ExemptionFilter, ExemptionRegistry, MemoryRegistry};
