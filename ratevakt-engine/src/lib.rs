//! # ratevakt Engine
//!
//! Runs the two concurrent loops of the rate monitor (ingestion and window
//! evaluation) and wires them to live capture and enforcement.

pub mod engine;
pub mod runtime;

pub use engine::{EngineError, IngestExit, Monitor, MonitorHandle, SchedulerState};
pub use runtime::{build_blocker, load_config, pcap_options, run_production_mode};
