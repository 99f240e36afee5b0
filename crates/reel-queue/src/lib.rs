//! In-memory job queue for the reel worker.
//!
//! This crate provides:
//! - A FIFO queue of job ids with an optional depth bound
//! - A keyed job store with bounded retention of finished jobs

pub mod error;
pub mod queue;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use queue::{JobQueue, JobReceiver, QueueConfig};
pub use store::JobStore;
