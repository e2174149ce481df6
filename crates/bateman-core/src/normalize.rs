//! Parsing and coercion of the model's reply.
//!
//! The reply is duck-typed JSON. Nothing untyped leaves this module: a reply
//! either fails with [`ReplyError`] or becomes a [`NormalizedReply`] whose
//! fields already satisfy the result invariants.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::policy::ScorePolicy;
use crate::repair::carve_object;
use crate::types::{EvaluationResult, Origin, Status};

/// Narrative substituted when the reply carries none.
pub const DEFAULT_NARRATIVE: &str =
    "Your resume reads like a mall-kiosk imitation of competence. Dorsia is not returning your call.";

/// Errors from reply parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("reply is JSON but not an object (found {0})")]
    NotAnObject(&'static str),
}

/// A reply that passed normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedReply {
    pub score: u8,
    pub status: Status,
    pub narrative: String,
    pub analysis_log: Vec<String>,
}

impl NormalizedReply {
    /// Promote to a result produced by the remote path.
    pub fn into_result(self) -> EvaluationResult {
        EvaluationResult {
            score: self.score,
            status: self.status,
            narrative: self.narrative,
            analysis_log: self.analysis_log,
            origin: Origin::Remote,
        }
    }
}

/// Carve and parse raw model text into a JSON object.
pub fn parse_reply(raw: &str) -> Result<Map<String, Value>, ReplyError> {
    let candidate = carve_object(raw);
    let value: Value =
        serde_json::from_str(candidate).map_err(|e| ReplyError::InvalidJson(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ReplyError::NotAnObject(json_kind(&other))),
    }
}

/// Coerce a parsed reply into a well-formed result body.
pub fn normalize_reply(reply: &Map<String, Value>, policy: &ScorePolicy) -> NormalizedReply {
    let score = match reply.get("score").and_then(score_value) {
        Some(raw) => policy.clamp(raw),
        None => policy.missing_score,
    };

    let status = reply
        .get("status")
        .and_then(Value::as_str)
        .and_then(Status::parse_loose)
        .unwrap_or_else(|| policy.status_for(score));

    // `roast` is the field the prompt asks for; `narrative` is accepted too.
    let narrative = ["roast", "narrative"]
        .iter()
        .filter_map(|key| reply.get(*key).and_then(Value::as_str))
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_NARRATIVE.to_string());

    NormalizedReply {
        score,
        status,
        narrative,
        analysis_log: analysis_log(reply.get("analysisLog")),
    }
}

/// Numbers are kept verbatim by the parser, so a literal past the f64
/// range reads as infinity here and takes the non-finite default.
fn score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

fn analysis_log(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
