//! Deterministic local verdict used whenever the remote reply is unusable.
//!
//! The verdict depends only on the input text and [`ELITE_SIGNALS`].

use crate::types::{EvaluationResult, Origin, Status};

/// Lower-case institution fragments that soften the fallback verdict.
pub const ELITE_SIGNALS: &[&str] = &[
    "goldman",
    "morgan stanley",
    "jp morgan",
    "j.p. morgan",
    "blackstone",
    "kkr",
    "mckinsey",
    "bain",
    "bcg",
];

pub const ELITE_FALLBACK_SCORE: u8 = 6;
pub const ELITE_FALLBACK_STATUS: Status = Status::Distressed;
pub const ELITE_FALLBACK_NARRATIVE: &str = "You touched real firms, but the way you describe it reads like HR copy. A partner would skim this and assume you were furniture in the conference room.";

pub const DEFAULT_FALLBACK_SCORE: u8 = 9;
pub const DEFAULT_FALLBACK_STATUS: Status = Status::Terminal;
pub const DEFAULT_FALLBACK_NARRATIVE: &str = "Nothing here signals someone the Street would fight to hire. This reads like a mall-franchise business plan: familiar, safe, and entirely forgettable.";

/// Whether `text` mentions any elite signal, case-insensitively.
pub fn has_elite_signal(text: &str) -> bool {
    let lower = text.to_lowercase();
    ELITE_SIGNALS.iter().any(|signal| lower.contains(signal))
}

/// Build the fallback result for `text`, tagged with `origin`.
pub fn fallback_result(text: &str, origin: Origin) -> EvaluationResult {
    let (score, status, narrative) = if has_elite_signal(text) {
        (
            ELITE_FALLBACK_SCORE,
            ELITE_FALLBACK_STATUS,
            ELITE_FALLBACK_NARRATIVE,
        )
    } else {
        (
            DEFAULT_FALLBACK_SCORE,
            DEFAULT_FALLBACK_STATUS,
            DEFAULT_FALLBACK_NARRATIVE,
        )
    };

    EvaluationResult {
        score,
        status,
        narrative: narrative.to_string(),
        analysis_log: Vec::new(),
        origin,
    }
}
