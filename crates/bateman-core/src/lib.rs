//! # bateman-core
//!
//! Deterministic half of the Bateman signal audit.
//!
//! Everything here is a pure function of its inputs:
//! - Request and result types with their invariants
//! - The canonical score policy (bounds and status bands)
//! - Carving a JSON object out of model prose
//! - Normalizing a parsed reply into a well-formed result
//! - The reply schema and drift detection
//! - The local fallback verdict
//!
//! No network calls are made from this crate. The remote call lives in
//! `bateman-runtime`.
//!
//! ## Example
//!
//! ```rust
//! use bateman_core::{normalize_reply, parse_reply, ScorePolicy, Status};
//!
//! let reply = parse_reply(r#"Verdict: {"score": 57, "status": "??", "roast": "x"}"#).unwrap();
//! let normalized = normalize_reply(&reply, &ScorePolicy::CANONICAL);
//!
//! assert_eq!(normalized.score, 10);
//! assert_eq!(normalized.status, Status::Terminal);
//! ```

pub mod fallback;
pub mod normalize;
pub mod policy;
pub mod repair;
pub mod schema;
pub mod types;

pub use fallback::{fallback_result, has_elite_signal, ELITE_SIGNALS};
pub use normalize::{normalize_reply, parse_reply, NormalizedReply, ReplyError, DEFAULT_NARRATIVE};
pub use policy::ScorePolicy;
pub use repair::carve_object;
pub use schema::{reply_schema, schema_drift};
pub use types::{EvaluationRequest, EvaluationResult, Origin, RequestError, Status};
