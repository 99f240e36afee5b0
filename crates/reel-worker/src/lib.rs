//! Reel worker.
//!
//! This crate provides:
//! - The job manager (`submit`, `status`, single FIFO worker)
//! - The per-job pipeline: acquisition, scoring, rendering, timeline
//! - Environment configuration, structured job logging and metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod pipeline;

pub use config::WorkerConfig;
pub use error::{SubmitError, WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use manager::JobManager;
pub use pipeline::{JobPipeline, Timeline, TimelineSegment};
