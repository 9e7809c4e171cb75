//! Credential handling for model providers.
//!
//! API keys are wrapped in [`ApiCredential`] as soon as they are read so
//! that they cannot end up in logs, `Debug` output or error messages.
//!
//! ```ignore
//! let key = ApiCredential::from_config_or_env(&config, "api_key", "GEMINI_API_KEY", "Gemini API key")?;
//! request.header("x-goog-api-key", key.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Provider configuration (JSON/YAML)
    Config,
    /// Environment variable
    Environment,
    /// Passed in by code
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API key.
///
/// `Debug` and `Display` print `[REDACTED]`; the value is zeroed on drop.
/// Call [`expose`](Self::expose) only where the key goes on the wire.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load from an environment variable. Unset and empty are both missing.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        match read_env(env_var) {
            Some(v) => Ok(Self::new(v, CredentialSource::Environment, name)),
            None => Err(ProviderError::NotConfigured(format!(
                "{} not set: configure '{}' environment variable",
                name, env_var
            ))),
        }
    }

    /// Load from `config[config_key]`, falling back to `env_var`.
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = config[config_key].as_str().filter(|v| !v.is_empty()) {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        if let Some(value) = read_env(env_var) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }

        Err(ProviderError::NotConfigured(format!(
            "{} required: set '{}' in config or {} environment variable",
            name, config_key, env_var
        )))
    }

    /// Whether a credential could be loaded, without loading it.
    pub fn is_available(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
        config[config_key].as_str().is_some_and(|v| !v.is_empty()) || read_env(env_var).is_some()
    }

    /// The raw key. Use at the point of sending only; never store it.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn read_env(env_var: &str) -> Option<String> {
    std::env::var(env_var).ok().filter(|v| !v.is_empty())
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_redacted_in_debug_and_display() {
        let secret = "AIza-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Config, "Gemini API key");

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(secret), "Secret exposed in Debug!");
        assert!(debug.contains("[REDACTED]"));

        let display = format!("{}", cred);
        assert!(!display.contains(secret), "Secret exposed in Display!");
        assert_eq!(display, "Gemini API key from config [REDACTED]");
    }

    #[test]
    fn test_credential_expose() {
        let cred = ApiCredential::new("key-1", CredentialSource::Programmatic, "Test");
        assert_eq!(cred.expose(), "key-1");
        assert!(!cred.is_empty());
        assert_eq!(cred.source(), CredentialSource::Programmatic);
    }

    #[test]
    fn test_config_takes_precedence_over_env() {
        std::env::set_var("COACH_TEST_KEY_PRIORITY", "env-key");
        let config = serde_json::json!({"api_key": "config-key"});

        let cred =
            ApiCredential::from_config_or_env(&config, "api_key", "COACH_TEST_KEY_PRIORITY", "Test key")
                .unwrap();
        assert_eq!(cred.expose(), "config-key");
        assert_eq!(cred.source(), CredentialSource::Config);

        std::env::remove_var("COACH_TEST_KEY_PRIORITY");
    }

    #[test]
    fn test_empty_config_value_falls_back_to_env() {
        std::env::set_var("COACH_TEST_KEY_FALLBACK", "env-key");
        let config = serde_json::json!({"api_key": ""});

        let cred =
            ApiCredential::from_config_or_env(&config, "api_key", "COACH_TEST_KEY_FALLBACK", "Test key")
                .unwrap();
        assert_eq!(cred.expose(), "env-key");
        assert_eq!(cred.source(), CredentialSource::Environment);

        std::env::remove_var("COACH_TEST_KEY_FALLBACK");
    }

    #[test]
    fn test_missing_credential_error_names_sources() {
        let err = ApiCredential::from_config_or_env(
            &serde_json::json!({}),
            "api_key",
            "COACH_NONEXISTENT_VAR_12345",
            "Test key",
        )
        .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("Test key"));
        assert!(msg.contains("api_key"));
        assert!(msg.contains("COACH_NONEXISTENT_VAR_12345"));
    }

    #[test]
    fn test_is_available() {
        let config = serde_json::json!({"api_key": "value"});
        assert!(ApiCredential::is_available(&config, "api_key", "COACH_NONEXISTENT"));
        assert!(!ApiCredential::is_available(
            &serde_json::json!({}),
            "api_key",
            "COACH_NONEXISTENT"
        ));
    }
}
