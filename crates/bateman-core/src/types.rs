//! Request and result types shared by the adapter and the HTTP boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Severity band attached to every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Catastrophic signal; top band
    Terminal,
    /// Flawed but salvageable; middle band
    Distressed,
    /// Bottom band
    Retail,
}

impl Status {
    /// All allowed literals, in declaration order.
    pub const ALL: [Status; 3] = [Status::Terminal, Status::Distressed, Status::Retail];

    /// The wire literal for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Terminal => "TERMINAL",
            Status::Distressed => "DISTRESSED",
            Status::Retail => "RETAIL",
        }
    }

    /// Parse a status the way a model might spell it: surrounding whitespace
    /// and casing are ignored. Anything else is `None`.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_uppercase();
        Self::ALL.into_iter().find(|s| s.as_str() == normalized)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which code path produced a result.
///
/// Diagnostic only. Callers must not branch on it for correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Parsed and normalized model reply
    Remote,
    /// Remote service answered with a non-success status
    FallbackHttp,
    /// Remote service answered but carried no text
    FallbackEmpty,
    /// Text could not be parsed as a JSON object, even after carving
    FallbackParse,
    /// Transport fault, timeout, envelope decode failure, or panic
    FallbackError,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Remote => "remote",
            Origin::FallbackHttp => "fallback_http",
            Origin::FallbackEmpty => "fallback_empty",
            Origin::FallbackParse => "fallback_parse",
            Origin::FallbackError => "fallback_error",
        }
    }

    pub fn is_fallback(&self) -> bool {
        !matches!(self, Origin::Remote)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("resume text is empty")]
    EmptyText,
}

/// A single audit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationRequest {
    text: String,
}

impl EvaluationRequest {
    /// Create a request. The text is kept verbatim but must contain
    /// something other than whitespace.
    pub fn new(text: impl Into<String>) -> Result<Self, RequestError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(RequestError::EmptyText);
        }
        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The normalized outcome of one request.
///
/// Field names on the wire follow the contract the front-end already
/// consumes (`roast`, `analysisLog`, `_source`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Integer score within `ScorePolicy::CANONICAL`
    pub score: u8,

    /// Severity band
    pub status: Status,

    /// Free-form verdict; never empty
    #[serde(rename = "roast")]
    pub narrative: String,

    /// Short log lines from the extended contract; empty otherwise
    #[serde(rename = "analysisLog", default)]
    pub analysis_log: Vec<String>,

    /// Code path that produced this result
    #[serde(rename = "_source")]
    pub origin: Origin,
}
