//! LLM provider abstractions for bateman-runtime.
//!
//! This module defines the trait the adapter calls through and the Gemini
//! REST implementation behind it.
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

mod factory;
mod gemini;
pub mod secrets;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use gemini::{GeminiProvider, GeminiProviderFactory, GEMINI_API_KEY_ENV, GEMINI_DEFAULT_BASE_URL};
pub use secrets::{ApiCredential, CredentialSource, EnvLookup, ProcessEnv};

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Response envelope parse error: {0}")]
    ParseError(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid provider settings: {0}")]
    InvalidConfig(String),
}

impl ProviderError {
    /// HTTP status of a non-success reply, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::ApiError { status, .. } => Some(*status),
            ProviderError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

/// How much internal reasoning the model may spend before answering.
///
/// Kept low by default so that the output budget is not consumed by
/// reasoning tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    #[default]
    Low,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::High => "high",
        }
    }
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,

    /// Reasoning budget, for providers that expose one
    pub reasoning_effort: Option<ReasoningEffort>,

    /// Strict output schema, for providers that enforce one
    pub response_schema: Option<JsonValue>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-pro-preview".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
            timeout: Duration::from_secs(25),
            reasoning_effort: Some(ReasoningEffort::Low),
            response_schema: None,
        }
    }
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system" or "user"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == "system"
    }
}

/// Response from an LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Extracted text; empty when the envelope carried none
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model that answered
    pub model: String,

    /// Stop reason
    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the visible completion
    pub completion_tokens: u32,

    /// Tokens spent on internal reasoning
    pub thoughts_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens + self.thoughts_tokens
    }
}

/// Provider abstraction allows swapping LLM backends.
///
/// The adapter is the only caller. Implementations must map every
/// non-success HTTP reply to [`ProviderError::ApiError`] or
/// [`ProviderError::RateLimited`] so the adapter can tell them apart from
/// transport faults.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if provider is usable.
    async fn health_check(&self) -> bool;

    /// Get provider name for logs.
    fn name(&self) -> &str;

    /// Whether [`CompletionConfig::response_schema`] is enforced remotely.
    fn supports_response_schema(&self) -> bool {
        false
    }
}
