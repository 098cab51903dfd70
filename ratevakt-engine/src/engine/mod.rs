mod error;
mod ingest;
mod monitor;
mod scheduler;
mod ticker;

pub use self::{
    error::EngineError,
    ingest::{IngestExit, IngestLoop},
    monitor::{Monitor, MonitorHandle},
    scheduler::{SchedulerState, WindowReport, WindowScheduler},
    ticker::{IntervalTicker, ManualTicker, TickHandle, Ticker},
};

pub mod prelude {
    pub use super::{EngineError, Monitor, MonitorHandle, SchedulerState};
}
