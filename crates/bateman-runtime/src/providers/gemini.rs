//! Google Gemini provider over the `generateContent` REST endpoint.
//!
//! Supports strict JSON output (`responseJsonSchema`) and the Gemini 3
//! `thinkingLevel` control.
//!
//! ## Security
//!
//! The API key is held in an [`ApiCredential`] and is only exposed when the
//! `x-goog-api-key` header is set.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource, EnvLookup},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use crate::excerpt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable name for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Public Generative Language API root.
pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Upper bound on the error-body excerpt carried in [`ProviderError::ApiError`].
const ERROR_BODY_EXCERPT_CHARS: usize = 1024;

/// Gemini provider.
pub struct GeminiProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    /// Create a provider with a programmatic key and the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_credential(
            ApiCredential::new(api_key, CredentialSource::Programmatic, "Gemini API key"),
            GEMINI_DEFAULT_BASE_URL,
        )
    }

    /// Create from JSON settings with environment fallback.
    ///
    /// 1. `api_key` in the settings
    /// 2. `GEMINI_API_KEY` from `env`
    /// 3. Otherwise [`ProviderError::NotConfigured`]
    ///
    /// `base_url` is optional.
    pub fn from_config(config: &JsonValue, env: &dyn EnvLookup) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            GEMINI_API_KEY_ENV,
            "Gemini API key",
            env,
        )?;

        let base_url = config["base_url"]
            .as_str()
            .unwrap_or(GEMINI_DEFAULT_BASE_URL);

        tracing::debug!(
            credential = credential.name(),
            source = %credential.source(),
            base_url,
            "resolved Gemini credential"
        );

        Self::with_credential(credential, base_url)
    }

    fn with_credential(
        credential: ApiCredential,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bateman/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            credential,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

/// `generateContent` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_level: &'static str,
}

/// `generateContent` response envelope. Every field is optional; an
/// envelope with nothing usable yields empty content, not an error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<JsonValue>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    thoughts_token_count: u32,
}

impl GenerateContentResponse {
    /// Text of the first non-thought part of the first candidate whose
    /// `text` is a string.
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .as_ref()?
            .iter()
            .filter(|part| part.thought != Some(true))
            .find_map(|part| part.text.as_ref().and_then(JsonValue::as_str))
    }

    fn finish_reason(&self) -> Option<String> {
        self.candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.finish_reason.clone())
    }
}

fn build_request(messages: Vec<ChatMessage>, config: &CompletionConfig) -> GenerateContentRequest {
    let (system, user): (Vec<ChatMessage>, Vec<ChatMessage>) =
        messages.into_iter().partition(ChatMessage::is_system);

    let system_instruction = if system.is_empty() {
        None
    } else {
        Some(Content {
            role: None,
            parts: system
                .into_iter()
                .map(|m| TextPart { text: m.content })
                .collect(),
        })
    };

    let contents = user
        .into_iter()
        .map(|m| Content {
            role: Some(m.role),
            parts: vec![TextPart { text: m.content }],
        })
        .collect();

    GenerateContentRequest {
        contents,
        system_instruction,
        generation_config: GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
            thinking_config: config.reasoning_effort.map(|effort| ThinkingConfig {
                thinking_level: effort.as_str(),
            }),
            response_mime_type: Some("application/json"),
            response_json_schema: config.response_schema.clone(),
        },
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = build_request(messages, config);

        // Only expose the credential here, at the point of use
        let response = self
            .client
            .post(self.endpoint(&config.model))
            .header("x-goog-api-key", self.credential.expose())
            .header("content-type", "application/json")
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: excerpt(&body, ERROR_BODY_EXCERPT_CHARS),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        let envelope: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::ParseError(format!("{} in {}", e, excerpt(&body, ERROR_BODY_EXCERPT_CHARS)))
        })?;

        let content = envelope.first_text().unwrap_or_default().to_string();
        if content.is_empty() {
            tracing::debug!(
                envelope = %excerpt(&body, ERROR_BODY_EXCERPT_CHARS),
                "Gemini envelope carried no text part"
            );
        }

        let usage = envelope.usage_metadata.as_ref();
        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: usage.map_or(0, |u| u.prompt_token_count),
                completion_tokens: usage.map_or(0, |u| u.candidates_token_count),
                thoughts_tokens: usage.map_or(0, |u| u.thoughts_token_count),
            },
            model: envelope
                .model_version
                .clone()
                .unwrap_or_else(|| config.model.clone()),
            stop_reason: envelope.finish_reason(),
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn supports_response_schema(&self) -> bool {
        true
    }
}

/// Factory for creating Gemini providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "...",          // Optional, falls back to GEMINI_API_KEY
///   "base_url": "https://..."  // Optional, custom API root
/// }
/// ```
pub struct GeminiProviderFactory;

impl ProviderFactory for GeminiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn create(
        &self,
        config: &JsonValue,
        env: &dyn EnvLookup,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(GeminiProvider::from_config(config, env)?))
    }

    fn validate_config(&self, config: &JsonValue, env: &dyn EnvLookup) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", GEMINI_API_KEY_ENV, env) {
            return Err(ProviderError::NotConfigured(format!(
                "{} is not configured",
                GEMINI_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::InvalidConfig(format!(
                    "base_url must start with http:// or https://, got '{}'",
                    url
                )));
            }
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "Google Gemini generateContent provider with structured output"
    }
}
