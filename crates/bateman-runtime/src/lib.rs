//! # bateman-runtime
//!
//! The remote half of Bateman: a Gemini-backed resume evaluator wrapped in
//! an adapter that always answers.
//!
//! The deterministic pieces (status bands, reply repair, the local
//! fallback) live in `bateman-core`. This crate adds the provider, the
//! prompts, and the state machine that picks between a remote reply and a
//! local fallback.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bateman_runtime::{AdapterConfig, EvaluationAdapter, EvaluationRequest, ProcessEnv, ProviderRegistry};
//!
//! let adapter = EvaluationAdapter::from_registry(
//!     &ProviderRegistry::with_defaults(),
//!     "gemini",
//!     &serde_json::json!({}),
//!     &ProcessEnv,
//!     AdapterConfig::default(),
//! )?;
//!
//! let result = adapter.evaluate(&EvaluationRequest::new(resume)?).await;
//! println!("{} {} ({})", result.score, result.status, result.origin);
//! ```

use thiserror::Error;

pub mod adapter;
pub mod config;
pub mod prompts;
pub mod providers;

pub use adapter::EvaluationAdapter;
pub use config::{AdapterConfig, ConfigError};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, CredentialSource, EnvLookup,
    GeminiProvider, GeminiProviderFactory, LlmProvider, ProcessEnv, ProviderError, ProviderFactory,
    ProviderRegistry, ReasoningEffort, TokenUsage, GEMINI_API_KEY_ENV,
};

pub use bateman_core::{EvaluationRequest, EvaluationResult, Origin, RequestError, Status};

/// Errors raised while building an adapter. Evaluation itself never fails.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("invalid adapter configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// At most `max_chars` characters of `text`, cut on a char boundary.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
