//! Score bounds and the score-to-status table.
//!
//! There is exactly one policy. The bound is [1, 10] and the bands are
//! fixed constants; they are never inferred from observed scores.

use crate::types::Status;

/// Score clamping and banding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScorePolicy {
    /// Lowest allowed score (inclusive)
    pub min: u8,

    /// Highest allowed score (inclusive)
    pub max: u8,

    /// Score used when the model gives no usable number
    pub missing_score: u8,

    /// Scores at or above this are TERMINAL
    pub terminal_at: u8,

    /// Scores at or above this (and below `terminal_at`) are DISTRESSED
    pub distressed_at: u8,
}

impl ScorePolicy {
    /// The canonical policy: [1, 10], missing → 9, TERMINAL ≥ 9, DISTRESSED ≥ 6.
    pub const CANONICAL: ScorePolicy = ScorePolicy {
        min: 1,
        max: 10,
        missing_score: 9,
        terminal_at: 9,
        distressed_at: 6,
    };

    /// Round to the nearest integer and clamp into `[min, max]`.
    ///
    /// Non-finite input yields `missing_score`.
    pub fn clamp(&self, raw: f64) -> u8 {
        if !raw.is_finite() {
            return self.missing_score;
        }
        raw.round().clamp(f64::from(self.min), f64::from(self.max)) as u8
    }

    /// Band a (clamped) score.
    pub fn status_for(&self, score: u8) -> Status {
        if score >= self.terminal_at {
            Status::Terminal
        } else if score >= self.distressed_at {
            Status::Distressed
        } else {
            Status::Retail
        }
    }

    pub fn contains(&self, score: u8) -> bool {
        (self.min..=self.max).contains(&score)
    }
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self::CANONICAL
    }
}
