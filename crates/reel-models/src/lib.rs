//! Shared data models for the reel engine.
//!
//! This crate provides Serde-serializable types for:
//! - Job requests and their defaults
//! - Jobs, job ids and the status state machine
//! - Rendered artifact paths and candidate windows
//! - Scored source segments
//! - Aspect ratios and encoding configuration

pub mod artifacts;
pub mod aspect;
pub mod encoding;
pub mod job;
pub mod request;
pub mod segment;

// Re-export common types
pub use artifacts::{ArtifactPaths, CandidateWindow};
pub use aspect::{AspectRatio, AspectRatioParseError};
pub use encoding::EncodingConfig;
pub use job::{Job, JobId, JobStatus, JobStatusResponse, SubmitResponse, TransitionError};
pub use request::{JobRequest, Postpass, ReelMode, RequestError};
pub use segment::Segment;
