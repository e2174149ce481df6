//! Adapter configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::providers::ReasoningEffort;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("max_output_tokens must be greater than zero")]
    ZeroOutputCap,

    #[error("temperature {0} is outside [0.0, 2.0]")]
    TemperatureOutOfRange(f32),

    #[error("model name is empty")]
    EmptyModel,
}

/// Settings for one [`EvaluationAdapter`](crate::EvaluationAdapter).
///
/// Every field has a default, so an empty YAML mapping is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Model identifier
    pub model: String,

    /// Cap on generated tokens
    pub max_output_tokens: u32,

    /// Sampling temperature; kept moderate-to-low
    pub temperature: f32,

    /// Reasoning budget; `None` leaves the provider default
    pub reasoning_effort: Option<ReasoningEffort>,

    /// Bound on the whole remote call, e.g. "25s"
    #[serde(with = "duration_human")]
    pub timeout: Duration,

    /// Ask for, and keep, the `analysisLog` array
    pub extended: bool,

    /// Characters of raw model text kept in failure logs
    pub log_excerpt_chars: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-pro-preview".to_string(),
            max_output_tokens: 2048,
            temperature: 0.7,
            reasoning_effort: Some(ReasoningEffort::Low),
            timeout: Duration::from_secs(25),
            extended: false,
            log_excerpt_chars: 512,
        }
    }
}

impl AdapterConfig {
    /// Create a config for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_output_tokens == 0 {
            return Err(ConfigError::ZeroOutputCap);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::TemperatureOutOfRange(self.temperature));
        }
        Ok(())
    }
}

/// Durations as humantime strings ("25s", "1m 30s").
mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
