//! Runtime configuration.
//!
//! Loaded from an optional YAML file, then overridden from the
//! environment. Every field has a default, so an empty file (or no file)
//! is a valid configuration.
//!
//! ```yaml
//! provider:
//!   type: gemini
//! completion:
//!   model: gemini-2.5-flash
//! retry:
//!   retries: 4
//!   min_delay: 500ms
//!   max_delay: 6s
//! cache:
//!   enabled: true
//!   ttl: 10m
//! server:
//!   bind: 127.0.0.1:5000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::providers::CompletionConfig;
use crate::resilience::RetryPolicy;

/// Environment variable overriding the model name.
pub const MODEL_ENV: &str = "COACH_MODEL";

/// Environment variable overriding the server bind address.
pub const BIND_ENV: &str = "COACH_BIND";

/// Errors loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which provider to build and with what settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Registered provider type (e.g. "gemini")
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Provider-specific settings, passed to the provider factory as JSON
    #[serde(flatten)]
    pub options: serde_json::Map<String, JsonValue>,
}

fn default_provider_type() -> String {
    "gemini".to_string()
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            options: serde_json::Map::new(),
        }
    }
}

impl ProviderSettings {
    /// Settings as the JSON object provider factories expect.
    pub fn as_json(&self) -> JsonValue {
        JsonValue::Object(self.options.clone())
    }
}

/// Result cache settings. Off unless `enabled` is set, so that each
/// evaluation calls the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    pub max_entries: u64,

    #[serde(with = "duration_str")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: 1000,
            ttl: Duration::from_secs(600),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderSettings,

    pub completion: CompletionConfig,

    pub retry: RetryPolicy,

    pub cache: CacheConfig,

    pub server: ServerConfig,
}

impl RuntimeConfig {
    /// Parse from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserialises to unit, not a map
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load from an optional file and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading configuration file");
                Self::from_yaml_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `COACH_MODEL` and `COACH_BIND` if set.
    pub fn apply_env(&mut self) {
        if let Some(model) = std::env::var(MODEL_ENV).ok().filter(|v| !v.is_empty()) {
            self.completion.model = model;
        }
        if let Some(bind) = std::env::var(BIND_ENV).ok().filter(|v| !v.is_empty()) {
            self.server.bind = bind;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.min_delay > self.retry.max_delay {
            return Err(ConfigError::Invalid(format!(
                "retry.min_delay ({:?}) exceeds retry.max_delay ({:?})",
                self.retry.min_delay, self.retry.max_delay
            )));
        }
        if self.completion.model.trim().is_empty() {
            return Err(ConfigError::Invalid("completion.model is empty".to_string()));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_entries must be positive when the cache is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serde adapter for human-readable durations (`"500ms"`, `"6s"`, `"10m"`).
pub mod duration_str {
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
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
