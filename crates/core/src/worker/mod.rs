//! Worker runtime: one poll loop per enabled pipeline.
//!
//! Each loop repeatedly derives a marker, drains the poller's candidate
//! stream through its coordinator one candidate at a time, then sleeps.
//! Shutdown is observed between candidates and between cycles, never in
//! the middle of a pipeline run.

mod pipeline_loop;
mod runner;
mod types;

pub use pipeline_loop::PipelineLoop;
pub use runner::Worker;
pub use types::{CycleSummary, PipelineLoopStatus, WorkerStatus};
