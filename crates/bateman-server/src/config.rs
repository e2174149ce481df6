//! Configuration file parsing for the server.
//!
//! Loads settings from YAML: bind address, provider selection and the
//! adapter's generation controls. The API key is normally left out and
//! read from `GEMINI_API_KEY`.

use bateman_runtime::{AdapterConfig, ConfigError as AdapterConfigError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;
use thiserror::Error;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse config YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Adapter settings out of range
    #[error("Invalid adapter settings: {0}")]
    Adapter(#[from] AdapterConfigError),
}

/// Server configuration loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8888)
    pub bind_port: u16,

    /// Which provider to build, plus its settings
    pub provider: ProviderSection,

    /// Generation controls and timeout
    pub adapter: AdapterConfig,
}

/// Provider selection.
///
/// `type` picks the factory; every other key is handed to it as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(rename = "type", default = "default_provider_type")]
    pub kind: String,

    #[serde(flatten)]
    pub settings: Map<String, JsonValue>,
}

fn default_provider_type() -> String {
    "gemini".to_string()
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            kind: default_provider_type(),
            settings: Map::new(),
        }
    }
}

impl ProviderSection {
    pub fn settings_json(&self) -> JsonValue {
        JsonValue::Object(self.settings.clone())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8888,
            provider: ProviderSection::default(),
            adapter: AdapterConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_yaml::from_str(contents)?;
        config.adapter.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8888");
        assert_eq!(config.provider.kind, "gemini");
        assert!(config.provider.settings.is_empty());
        assert_eq!(config.adapter, AdapterConfig::default());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
bind_address: 0.0.0.0
bind_port: 9000
provider:
  type: gemini
  base_url: https://proxy.internal/v1beta
adapter:
  model: gemini-2.5-flash
  timeout: 10s
  extended: true
"#;

        let config = ServerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.provider.kind, "gemini");
        assert_eq!(
            config.provider.settings_json()["base_url"],
            "https://proxy.internal/v1beta"
        );
        assert_eq!(config.adapter.model, "gemini-2.5-flash");
        assert_eq!(config.adapter.timeout, Duration::from_secs(10));
        assert!(config.adapter.extended);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/bateman.yaml");
        assert_eq!(ServerConfig::from_file(path).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_empty_yaml_is_defaults() {
        let config = ServerConfig::from_yaml("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_invalid_adapter_rejected() {
        let result = ServerConfig::from_yaml("adapter:\n  max_output_tokens: 0\n");
        assert!(matches!(result, Err(ConfigError::Adapter(_))));
    }

    #[test]
    fn test_load_without_path() {
        assert_eq!(ServerConfig::load(None).unwrap(), ServerConfig::default());
        assert!(matches!(
            ServerConfig::load(Some(Path::new("/nonexistent/bateman.yaml"))),
            Err(ConfigError::FileRead(_))
        ));
    }
}
