//! Model provider abstraction.
//!
//! A provider turns a list of chat messages into the provider's raw JSON
//! response. It does not interpret the response: locating and parsing
//! the generated text is `coach-core`'s job, because the envelope shape
//! differs between providers and API versions.
//!
//! Failures are normalised into [`ProviderError`] at this boundary so
//! that retry logic only ever inspects one type.
//!
//! ## Security
//!
//! Providers hold keys in [`ApiCredential`]; see the [`secrets`] module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

use crate::resilience::Retryable;

mod factory;
pub mod secrets;

#[cfg(feature = "gemini")]
mod gemini;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiProvider, GeminiProviderFactory};

/// Provider status/code strings that signal rate-limiting or overload.
pub const RATE_LIMIT_CODES: [&str; 2] = ["RESOURCE_EXHAUSTED", "TOO_MANY_REQUESTS"];

/// HTTP status that signals rate-limiting.
pub const RATE_LIMIT_STATUS: u16 = 429;

/// Errors from model providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded ({signal}), retry after {retry_after:?}")]
    RateLimited {
        /// The status or code that identified the rate limit
        signal: String,
        retry_after: Option<Duration>,
    },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Map a failed call into the error taxonomy.
    ///
    /// Providers report the same condition under different field names:
    /// an HTTP `status`, a top-level `code`, or a nested `error.code` /
    /// `error.status`, each either numeric or symbolic. All of them are
    /// inspected; any rate-limit signal wins over everything else.
    /// A `retryDelay` hint in `error.details` is kept on the rate-limit error.
    pub fn from_error_body(http_status: Option<u16>, body: &JsonValue) -> Self {
        let signals = [
            http_status.map(JsonValue::from),
            body.get("status").cloned(),
            body.get("code").cloned(),
            body.pointer("/error/code").cloned(),
            body.pointer("/error/status").cloned(),
        ];

        if let Some(signal) = signals.iter().flatten().find_map(rate_limit_signal) {
            return ProviderError::RateLimited {
                signal,
                retry_after: retry_delay_hint(body),
            };
        }

        let numeric_status = signals
            .iter()
            .flatten()
            .find_map(|s| s.as_u64())
            .and_then(|s| u16::try_from(s).ok());

        let symbolic = signals.iter().flatten().filter_map(|s| s.as_str());
        let auth_failure = matches!(numeric_status, Some(401) | Some(403))
            || symbolic
                .into_iter()
                .any(|s| matches!(s, "UNAUTHENTICATED" | "PERMISSION_DENIED"));
        if auth_failure {
            return ProviderError::AuthError;
        }

        let message = body
            .pointer("/error/message")
            .or_else(|| body.get("message"))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .or_else(|| body.as_str().map(str::to_string))
            .unwrap_or_else(|| body.to_string());

        ProviderError::ApiError {
            status: numeric_status.unwrap_or(0),
            message,
        }
    }

    /// Replace the suggested delay of a rate-limit error, e.g. from a
    /// `Retry-After` header. Other errors and `None` pass through.
    pub fn with_retry_after(self, delay: Option<Duration>) -> Self {
        match (self, delay) {
            (ProviderError::RateLimited { signal, .. }, Some(delay)) => ProviderError::RateLimited {
                signal,
                retry_after: Some(delay),
            },
            (err, _) => err,
        }
    }

    /// Whether this error means "try again later".
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

fn rate_limit_signal(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Number(n) if n.as_u64() == Some(RATE_LIMIT_STATUS as u64) => {
            Some(RATE_LIMIT_STATUS.to_string())
        }
        JsonValue::String(s) => {
            let upper = s.trim().to_ascii_uppercase();
            if upper == RATE_LIMIT_STATUS.to_string() || RATE_LIMIT_CODES.contains(&upper.as_str()) {
                Some(upper)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Delay from a Google `RetryInfo` detail (`"retryDelay": "30s"`).
fn retry_delay_hint(body: &JsonValue) -> Option<Duration> {
    body.pointer("/error/details")?
        .as_array()?
        .iter()
        .filter_map(|detail| detail.get("retryDelay")?.as_str())
        .find_map(parse_delay)
}

/// Parse a delay given as whole seconds (`"30"`), a humantime string
/// (`"30s"`, `"1m"`) or fractional seconds (`"1.5s"`).
pub fn parse_delay(text: &str) -> Option<Duration> {
    let text = text.trim();
    if let Ok(secs) = text.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime::parse_duration(text).ok().or_else(|| {
        text.strip_suffix('s')?
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
    })
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        self.is_rate_limited()
    }
}

/// Configuration for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Per-request HTTP timeout
    #[serde(with = "crate::config::duration_str")]
    pub timeout: Duration,

    /// Ask the provider for a JSON response body where supported
    pub json_mode: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            timeout: Duration::from_secs(30),
            json_mode: true,
        }
    }
}

/// A chat message for completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Provider abstraction allows swapping model backends.
///
/// This is the only place where remote model calls are made.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a completion and return the provider's raw response body.
    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<JsonValue, ProviderError>;

    /// Check if provider is usable.
    async fn health_check(&self) -> bool;

    /// Provider name for logs and the health endpoint.
    fn name(&self) -> &str;
}
