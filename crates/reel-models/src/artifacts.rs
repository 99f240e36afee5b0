//! Rendered artifact records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Segment;

/// A scored window reported to callers as an alternative cut.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CandidateWindow {
    pub start: f64,
    pub end: f64,
    pub score: f64,
}

impl From<&Segment> for CandidateWindow {
    fn from(segment: &Segment) -> Self {
        Self {
            start: segment.start,
            end: segment.end,
            score: segment.score,
        }
    }
}

/// Public paths of everything a job rendered.
///
/// Paths are `/photos/<relative>` URLs; absent artifacts serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactPaths {
    pub best_reel_mp4: Option<String>,
    #[serde(default)]
    pub alt_candidates: Vec<CandidateWindow>,
    pub captions_srt: Option<String>,
    pub timeline_json: Option<String>,
    pub cover_jpg: Option<String>,
}
