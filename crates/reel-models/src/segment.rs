//! Scored source segments.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A contiguous window `[start, end)` of one source video with its motion score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Source file the window belongs to
    pub path: PathBuf,
    /// Window start in seconds
    pub start: f64,
    /// Window end in seconds (exclusive)
    pub end: f64,
    /// Mean motion energy over the window
    pub score: f64,
}

impl Segment {
    pub fn new(path: impl Into<PathBuf>, start: f64, end: f64, score: f64) -> Self {
        Self {
            path: path.into(),
            start,
            end,
            score,
        }
    }

    /// Unscored window, used when motion scoring is unavailable.
    pub fn unscored(path: impl Into<PathBuf>, start: f64, end: f64) -> Self {
        Self::new(path, start, end, 0.0)
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Half-open interval overlap test. Windows on different sources never overlap.
    pub fn overlaps(&self, other: &Segment) -> bool {
        self.path == other.path && self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        assert!((Segment::new("a", 2.0, 5.0, 1.0).duration() - 3.0).abs() < 1e-9);
        assert_eq!(Segment::new("a", 5.0, 2.0, 1.0).duration(), 0.0);
    }

    #[test]
    fn test_overlaps_half_open() {
        let a = Segment::new("a.mp4", 0.0, 3.0, 1.0);
        let b = Segment::new("a.mp4", 3.0, 6.0, 1.0);
        let c = Segment::new("a.mp4", 2.9, 5.0, 1.0);
        let d = Segment::new("b.mp4", 0.0, 3.0, 1.0);

        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        assert!(!a.overlaps(&d));
    }
}
