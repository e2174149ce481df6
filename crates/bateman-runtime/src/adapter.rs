//! The evaluation adapter: one remote call, then normalization or fallback.
//!
//! # State machine
//! The first matching state wins:
//!
//! | State        | Condition                                   | Origin           |
//! |--------------|---------------------------------------------|------------------|
//! | HTTP failure | provider reports a non-success status       | `fallback_http`  |
//! | Empty text   | success, but no text in the envelope        | `fallback_empty` |
//! | Unparseable  | text is not a JSON object, even carved      | `fallback_parse` |
//! | Exception    | timeout, transport, envelope decode, panic  | `fallback_error` |
//! | Success      | parsed object                               | `remote`         |
//!
//! Every path yields an [`EvaluationResult`]; nothing propagates to the caller.

use futures::FutureExt;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use bateman_core::{
    fallback_result, normalize_reply, parse_reply, reply_schema, schema_drift, EvaluationRequest,
    EvaluationResult, Origin, ReplyError, ScorePolicy,
};

use crate::config::AdapterConfig;
use crate::excerpt;
use crate::prompts;
use crate::providers::{CompletionConfig, EnvLookup, LlmProvider, ProviderError, ProviderRegistry};
use crate::RuntimeError;

/// Why the remote path was abandoned.
#[derive(Error, Debug)]
enum RemoteFailure {
    #[error("remote service returned HTTP {status}")]
    Http { status: u16, detail: String },

    #[error("remote reply carried no text")]
    Empty { stop_reason: Option<String> },

    #[error("remote reply is unusable: {reason}")]
    Unparseable { reason: ReplyError, raw: String },

    #[error("remote call failed: {0}")]
    Fault(String),
}

impl RemoteFailure {
    fn origin(&self) -> Origin {
        match self {
            RemoteFailure::Http { .. } => Origin::FallbackHttp,
            RemoteFailure::Empty { .. } => Origin::FallbackEmpty,
            RemoteFailure::Unparseable { .. } => Origin::FallbackParse,
            RemoteFailure::Fault(_) => Origin::FallbackError,
        }
    }
}

impl From<ProviderError> for RemoteFailure {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::ApiError { status, message } => RemoteFailure::Http {
                status,
                detail: message,
            },
            ProviderError::RateLimited { retry_after } => RemoteFailure::Http {
                status: 429,
                detail: format!("rate limited, retry after {:?}", retry_after),
            },
            other => RemoteFailure::Fault(other.to_string()),
        }
    }
}

/// Forwards resume text to a provider and always returns a result.
///
/// Holds no mutable state; one instance can serve concurrent requests.
pub struct EvaluationAdapter {
    provider: Arc<dyn LlmProvider>,
    config: AdapterConfig,
    policy: ScorePolicy,
}

impl std::fmt::Debug for EvaluationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationAdapter")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl EvaluationAdapter {
    /// Create an adapter around an already-built provider.
    pub fn new(provider: Arc<dyn LlmProvider>, config: AdapterConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        Ok(Self {
            provider,
            config,
            policy: ScorePolicy::CANONICAL,
        })
    }

    /// Build the provider through `registry`, then the adapter.
    ///
    /// A missing credential surfaces here as
    /// [`ProviderError::NotConfigured`], before any request is served.
    pub fn from_registry(
        registry: &ProviderRegistry,
        provider_type: &str,
        settings: &JsonValue,
        env: &dyn EnvLookup,
        config: AdapterConfig,
    ) -> Result<Self, RuntimeError> {
        let provider = registry.create(provider_type, settings, env)?;
        Self::new(provider, config)
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn is_healthy(&self) -> bool {
        self.provider.health_check().await
    }

    /// Evaluate one request. Never fails.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationResult {
        let started = Instant::now();

        let outcome = match AssertUnwindSafe(self.attempt(request)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(RemoteFailure::Fault(format!(
                "panic during evaluation: {}",
                panic_message(panic.as_ref())
            ))),
        };

        let result = match outcome {
            Ok(result) => result,
            Err(failure) => {
                self.log_failure(&failure);
                fallback_result(request.text(), failure.origin())
            }
        };

        tracing::info!(
            provider = self.provider.name(),
            origin = %result.origin,
            score = result.score,
            status = %result.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "evaluation complete"
        );

        result
    }

    async fn attempt(&self, request: &EvaluationRequest) -> Result<EvaluationResult, RemoteFailure> {
        let messages = prompts::build_messages(request.text(), self.config.extended);
        let completion = self.completion_config();

        let response = tokio::time::timeout(
            self.config.timeout,
            self.provider.complete(messages, &completion),
        )
        .await
        .map_err(|_| RemoteFailure::Fault(format!("timed out after {:?}", self.config.timeout)))??;

        tracing::debug!(
            model = %response.model,
            stop_reason = ?response.stop_reason,
            total_tokens = response.usage.total(),
            thoughts_tokens = response.usage.thoughts_tokens,
            "remote reply received"
        );

        if response.content.trim().is_empty() {
            return Err(RemoteFailure::Empty {
                stop_reason: response.stop_reason,
            });
        }

        let reply = parse_reply(&response.content).map_err(|reason| RemoteFailure::Unparseable {
            reason,
            raw: excerpt(&response.content, self.config.log_excerpt_chars),
        })?;

        let drift = schema_drift(&JsonValue::Object(reply.clone()), self.config.extended);
        if !drift.is_empty() {
            tracing::warn!(
                provider = self.provider.name(),
                violations = ?drift,
                "remote reply departs from declared schema; normalizing"
            );
        }

        let mut normalized = normalize_reply(&reply, &self.policy);
        if !self.config.extended {
            normalized.analysis_log.clear();
        }

        Ok(normalized.into_result())
    }

    fn completion_config(&self) -> CompletionConfig {
        let response_schema = self
            .provider
            .supports_response_schema()
            .then(|| reply_schema(self.config.extended));

        CompletionConfig {
            model: self.config.model.clone(),
            max_tokens: self.config.max_output_tokens,
            temperature: self.config.temperature,
            timeout: self.config.timeout,
            reasoning_effort: self.config.reasoning_effort,
            response_schema,
        }
    }

    fn log_failure(&self, failure: &RemoteFailure) {
        let origin = failure.origin();
        let provider = self.provider.name();

        match failure {
            RemoteFailure::Http { status, detail } => tracing::warn!(
                provider,
                %origin,
                status,
                body = %excerpt(detail, self.config.log_excerpt_chars),
                "remote service returned non-success status; serving fallback"
            ),
            RemoteFailure::Empty { stop_reason } => tracing::warn!(
                provider,
                %origin,
                stop_reason = ?stop_reason,
                "remote reply carried no text; serving fallback"
            ),
            RemoteFailure::Unparseable { reason, raw } => tracing::warn!(
                provider,
                %origin,
                error = %reason,
                raw = %raw,
                "remote reply could not be parsed; serving fallback"
            ),
            RemoteFailure::Fault(message) => tracing::error!(
                provider,
                %origin,
                error = %message,
                "remote call failed; serving fallback"
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionResponse, TokenUsage};
    use async_trait::async_trait;
    use bateman_core::fallback::{DEFAULT_FALLBACK_NARRATIVE, ELITE_FALLBACK_NARRATIVE};
    use bateman_core::{Status, DEFAULT_NARRATIVE};
    use std::sync::Mutex;
    use std::time::Duration;

    /// What the scripted provider does on `complete`.
    #[derive(Clone)]
    enum Script {
        Reply(&'static str),
        Api(u16),
        RateLimited,
        Transport,
        EnvelopeGarbage,
        Hang,
        Panic,
    }

    struct ScriptedProvider {
        script: Script,
        schema_support: bool,
        recorder: Recorder,
    }

    impl ScriptedProvider {
        fn new(script: Script) -> Self {
            Self {
                script,
                schema_support: true,
                recorder: Recorder::default(),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.recorder.record(&messages, config);
            match self.script.clone() {
                Script::Reply(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    usage: TokenUsage::default(),
                    model: config.model.clone(),
                    stop_reason: Some("STOP".to_string()),
                }),
                Script::Api(status) => Err(ProviderError::ApiError {
                    status,
                    message: "{\"error\":{\"message\":\"boom\"}}".to_string(),
                }),
                Script::RateLimited => Err(ProviderError::RateLimited {
                    retry_after: Some(Duration::from_secs(7)),
                }),
                Script::Transport => Err(ProviderError::HttpError("connection reset".to_string())),
                Script::EnvelopeGarbage => {
                    Err(ProviderError::ParseError("expected value at line 1".to_string()))
                }
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("the adapter timeout fires first")
                }
                Script::Panic => panic!("provider exploded"),
            }
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn supports_response_schema(&self) -> bool {
            self.schema_support
        }
    }

    /// Records every call the adapter makes.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Vec<ChatMessage>, CompletionConfig)>>,
    }

    impl Recorder {
        fn record(&self, messages: &[ChatMessage], config: &CompletionConfig) {
            self.calls
                .lock()
                .unwrap()
                .push((messages.to_vec(), config.clone()));
        }

        fn calls(&self) -> Vec<(Vec<ChatMessage>, CompletionConfig)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn adapter(script: Script) -> (EvaluationAdapter, Arc<ScriptedProvider>) {
        adapter_with(ScriptedProvider::new(script), AdapterConfig::default())
    }

    fn adapter_with(
        provider: ScriptedProvider,
        config: AdapterConfig,
    ) -> (EvaluationAdapter, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let adapter = EvaluationAdapter::new(provider.clone(), config).unwrap();
        (adapter, provider)
    }

    fn request(text: &str) -> EvaluationRequest {
        EvaluationRequest::new(text).unwrap()
    }

    #[tokio::test]
    async fn test_success_path() {
        let (adapter, _) = adapter(Script::Reply(
            r#"{"score": 7, "status": "DISTRESSED", "roast": "Eggshell with Romalian type."}"#,
        ));
        let result = adapter.evaluate(&request("VP, Pierce & Pierce")).await;

        assert_eq!(result.origin, Origin::Remote);
        assert_eq!(result.score, 7);
        assert_eq!(result.status, Status::Distressed);
        assert_eq!(result.narrative, "Eggshell with Romalian type.");
    }

    #[tokio::test]
    async fn test_success_after_carving_prose() {
        let (adapter, _) = adapter(Script::Reply(
            "Here you go:\n```json\n{\"score\": 3, \"status\": \"retail\", \"roast\": \"ok\"}\n```",
        ));
        let result = adapter.evaluate(&request("intern")).await;

        assert_eq!(result.origin, Origin::Remote);
        assert_eq!(result.status, Status::Retail);
    }

    #[tokio::test]
    async fn test_success_normalizes_bad_fields() {
        let (adapter, _) = adapter(Script::Reply(
            r#"{"score": 57, "status": "unknown", "narrative": "x"}"#,
        ));
        let result = adapter.evaluate(&request("intern")).await;

        assert_eq!(result.origin, Origin::Remote);
        assert_eq!(result.score, 10);
        assert_eq!(result.status, Status::Terminal);
    }

    #[tokio::test]
    async fn test_overflowing_score_keeps_remote_reply() {
        let (adapter, _) = adapter(Script::Reply(
            r#"{"score": 1e400, "status": "TERMINAL", "roast": "Off the scale."}"#,
        ));
        let result = adapter.evaluate(&request("intern")).await;

        assert_eq!(result.origin, Origin::Remote);
        assert_eq!(result.score, 9);
        assert_eq!(result.status, Status::Terminal);
        assert_eq!(result.narrative, "Off the scale.");
    }

    #[tokio::test]
    async fn test_missing_narrative_gets_default() {
        let (adapter, _) = adapter(Script::Reply(r#"{"score": 4, "status": "RETAIL"}"#));
        let result = adapter.evaluate(&request("intern")).await;

        assert_eq!(result.origin, Origin::Remote);
        assert_eq!(result.narrative, DEFAULT_NARRATIVE);
    }

    #[tokio::test]
    async fn test_http_failure_uses_fallback() {
        let (adapter, _) = adapter(Script::Api(500));
        let result = adapter.evaluate(&request("Cashier, mall kiosk")).await;

        assert_eq!(result.origin, Origin::FallbackHttp);
        assert_eq!(result.narrative, DEFAULT_FALLBACK_NARRATIVE);
        assert_eq!(result.score, 9);
        assert_eq!(result.status, Status::Terminal);
    }

    #[tokio::test]
    async fn test_elite_signal_softens_fallback() {
        let (adapter, _) = adapter(Script::Api(503));
        let result = adapter.evaluate(&request("Analyst at goldman sachs")).await;

        assert_eq!(result.origin, Origin::FallbackHttp);
        assert_eq!(result.score, 6);
        assert_eq!(result.status, Status::Distressed);
        assert_eq!(result.narrative, ELITE_FALLBACK_NARRATIVE);
    }

    #[tokio::test]
    async fn test_rate_limit_counts_as_http_failure() {
        let (adapter, _) = adapter(Script::RateLimited);
        let result = adapter.evaluate(&request("intern")).await;
        assert_eq!(result.origin, Origin::FallbackHttp);
    }

    #[tokio::test]
    async fn test_empty_text() {
        for text in ["", "   \n "] {
            let (adapter, _) = adapter(Script::Reply(text));
            let result = adapter.evaluate(&request("intern")).await;
            assert_eq!(result.origin, Origin::FallbackEmpty);
        }
    }

    #[tokio::test]
    async fn test_unparseable_text() {
        for text in ["I refuse to rate this.", "{\"score\": 5,", "[1, 2, 3]", "null"] {
            let (adapter, _) = adapter(Script::Reply(text));
            let result = adapter.evaluate(&request("intern")).await;
            assert_eq!(result.origin, Origin::FallbackParse, "input: {text}");
        }
    }

    #[tokio::test]
    async fn test_transport_and_envelope_faults() {
        for script in [Script::Transport, Script::EnvelopeGarbage] {
            let (adapter, _) = adapter(script);
            let result = adapter.evaluate(&request("intern")).await;
            assert_eq!(result.origin, Origin::FallbackError);
        }
    }

    #[tokio::test]
    async fn test_panic_is_absorbed() {
        let (adapter, _) = adapter(Script::Panic);
        let result = adapter.evaluate(&request("McKinsey BA")).await;

        assert_eq!(result.origin, Origin::FallbackError);
        assert_eq!(result.status, Status::Distressed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_bounded() {
        let config = AdapterConfig::default().with_timeout(Duration::from_secs(2));
        let (adapter, _) = adapter_with(ScriptedProvider::new(Script::Hang), config);

        let result = adapter.evaluate(&request("intern")).await;
        assert_eq!(result.origin, Origin::FallbackError);
    }

    #[tokio::test]
    async fn test_completion_config_carries_controls() {
        let (adapter, provider) = adapter(Script::Reply("{}"));
        adapter.evaluate(&request("Associate, KKR")).await;

        let calls = provider.recorder.calls();
        assert_eq!(calls.len(), 1);

        let (messages, config) = &calls[0];
        assert!(messages[1].content.contains("Associate, KKR"));
        assert_eq!(config.model, "gemini-3-pro-preview");
        assert_eq!(config.max_tokens, 2048);
        assert!(config.temperature <= 1.0);
        assert!(config.reasoning_effort.is_some());

        let schema = config.response_schema.as_ref().expect("schema declared");
        assert_eq!(schema["additionalProperties"], false);
    }

    #[tokio::test]
    async fn test_schema_omitted_when_unsupported() {
        let mut provider = ScriptedProvider::new(Script::Reply("{}"));
        provider.schema_support = false;
        let (adapter, provider) = adapter_with(provider, AdapterConfig::default());

        adapter.evaluate(&request("intern")).await;
        assert!(provider.recorder.calls()[0].1.response_schema.is_none());
    }

    #[tokio::test]
    async fn test_analysis_log_only_in_extended_mode() {
        let reply = r#"{"score": 8, "status": "DISTRESSED", "roast": "r", "analysisLog": ["PARSING_PEDIGREE: none"]}"#;

        let (basic, _) = adapter(Script::Reply(reply));
        assert!(basic.evaluate(&request("x")).await.analysis_log.is_empty());

        let (extended, provider) = adapter_with(
            ScriptedProvider::new(Script::Reply(reply)),
            AdapterConfig::default().with_extended(true),
        );
        let result = extended.evaluate(&request("x")).await;
        assert_eq!(result.analysis_log, vec!["PARSING_PEDIGREE: none".to_string()]);

        let schema = provider.recorder.calls()[0].1.response_schema.clone().unwrap();
        assert!(schema["required"]
            .as_array()
            .unwrap()
            .contains(&JsonValue::from("analysisLog")));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let provider = Arc::new(ScriptedProvider::new(Script::Reply("{}")));
        let config = AdapterConfig::default().with_timeout(Duration::ZERO);
        assert!(matches!(
            EvaluationAdapter::new(provider, config),
            Err(RuntimeError::Config(_))
        ));
    }

    #[test]
    fn test_from_registry_without_credential() {
        let env: std::collections::HashMap<String, String> = Default::default();
        let result = EvaluationAdapter::from_registry(
            &ProviderRegistry::with_defaults(),
            "gemini",
            &serde_json::json!({}),
            &env,
            AdapterConfig::default(),
        );
        assert!(matches!(
            result,
            Err(RuntimeError::Provider(ProviderError::NotConfigured(_)))
        ));
    }

    #[test]
    fn test_failure_origin_mapping() {
        let http: RemoteFailure = ProviderError::ApiError {
            status: 500,
            message: String::new(),
        }
        .into();
        assert_eq!(http.origin(), Origin::FallbackHttp);

        let timeout: RemoteFailure = ProviderError::Timeout(Duration::from_secs(1)).into();
        assert_eq!(timeout.origin(), Origin::FallbackError);

        let missing: RemoteFailure = ProviderError::NotConfigured("x".into()).into();
        assert_eq!(missing.origin(), Origin::FallbackError);
    }
}
