//! Google Gemini provider.
//!
//! Calls `models/{model}:generateContent` and returns the response body
//! untouched. System messages become the top-level `system_instruction`;
//! assistant turns use Gemini's `model` role.
//!
//! ## Security
//!
//! The key is held in an [`ApiCredential`] and only exposed when the
//! `x-goog-api-key` header is set.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    parse_delay, ChatMessage, CompletionConfig, LlmProvider, ProviderError,
};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

/// Environment variable name for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini provider.
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
    /// Create a provider with an explicit key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "Gemini API key",
        ))
    }

    /// Create from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(GEMINI_API_KEY_ENV, "Gemini API key")?;
        Ok(Self::with_credential(credential))
    }

    /// Create from JSON configuration, falling back to `GEMINI_API_KEY`.
    ///
    /// Recognised keys: `api_key`, `base_url`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            GEMINI_API_KEY_ENV,
            "Gemini API key",
        )?;

        let mut provider = Self::with_credential(credential);
        if let Some(url) = config["base_url"].as_str() {
            provider = provider.with_base_url(url);
        }
        Ok(provider)
    }

    fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    /// Build the `generateContent` request body.
    fn build_request_body(messages: Vec<ChatMessage>, config: &CompletionConfig) -> JsonValue {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for msg in messages {
            match msg.role.as_str() {
                "system" => system_parts.push(msg.content),
                "assistant" => contents.push(json!({
                    "role": "model",
                    "parts": [{"text": msg.content}],
                })),
                _ => contents.push(json!({
                    "role": "user",
                    "parts": [{"text": msg.content}],
                })),
            }
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": config.max_tokens,
                "temperature": config.temperature,
            },
        });

        if !system_parts.is_empty() {
            body["system_instruction"] = json!({
                "parts": [{"text": system_parts.join("\n\n")}]
            });
        }

        if config.json_mode {
            body["generationConfig"]["responseMimeType"] = json!("application/json");
        }

        body
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<JsonValue, ProviderError> {
        let body = Self::build_request_body(messages, config);
        let url = self.endpoint_url(&config.model);

        tracing::debug!(model = %config.model, "Sending generateContent request");

        // Only expose the credential here, at the point of use
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.credential.expose())
            .header("content-type", "application/json")
            .timeout(config.timeout)
            .json(&body)
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
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_delay);
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        if !status.is_success() {
            let body = serde_json::from_str(&text).unwrap_or(JsonValue::String(text));
            let err = ProviderError::from_error_body(Some(status.as_u16()), &body)
                .with_retry_after(retry_after);
            tracing::debug!(status = status.as_u16(), error = %err, "Gemini returned an error");
            return Err(err);
        }

        let body: JsonValue =
            serde_json::from_str(&text).map_err(|e| ProviderError::ParseError(e.to_string()))?;

        // Some gateways answer 200 with an error envelope
        if body.get("error").is_some() {
            return Err(ProviderError::from_error_body(None, &body));
        }

        Ok(body)
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Factory for Gemini providers.
///
/// ```json
/// {
///   "api_key": "...",        // Optional, falls back to GEMINI_API_KEY
///   "base_url": "https://..." // Optional
/// }
/// ```
pub struct GeminiProviderFactory;

impl ProviderFactory for GeminiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(GeminiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", GEMINI_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Gemini API key required: set 'api_key' in config or {} env",
                GEMINI_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = GeminiProvider::new("test-key");
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_endpoint_url() {
        let provider = GeminiProvider::new("k").with_base_url("https://example.test/v1beta/");
        assert_eq!(
            provider.endpoint_url("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body_roles() {
        let messages = vec![
            ChatMessage::system("You grade answers."),
            ChatMessage::user("Question?"),
            ChatMessage::assistant("Earlier reply"),
        ];
        let body = GeminiProvider::build_request_body(messages, &CompletionConfig::default());

        assert_eq!(body["system_instruction"]["parts"][0]["text"], "You grade answers.");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_request_body_without_json_mode() {
        let config = CompletionConfig {
            json_mode: false,
            ..Default::default()
        };
        let body = GeminiProvider::build_request_body(vec![ChatMessage::user("hi")], &config);
        assert!(body.get("system_instruction").is_none());
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_factory_create_with_api_key() {
        let factory = GeminiProviderFactory;
        assert_eq!(factory.provider_type(), "gemini");
        let provider = factory.create(&json!({"api_key": "test-api-key"})).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn test_factory_validate_invalid_base_url() {
        let factory = GeminiProviderFactory;
        let config = json!({"api_key": "k", "base_url": "invalid-url"});
        assert!(factory.validate_config(&config).is_err());
    }

    #[test]
    fn test_from_config_tracks_source() {
        let config = json!({"api_key": "config-key", "base_url": "https://custom.test/v1"});
        let provider = GeminiProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "https://custom.test/v1");
        assert_eq!(provider.credential.expose(), "config-key");
        assert_eq!(provider.credential.source(), CredentialSource::Config);
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "AIza-super-secret-key-12345";
        let provider = GeminiProvider::new(secret_key);
        let debug_output = format!("{:?}", provider);
        assert!(!debug_output.contains(secret_key), "API key was exposed in Debug output!");
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_health_check_requires_key() {
        assert!(GeminiProvider::new("key").health_check().await);
        assert!(!GeminiProvider::new("").health_check().await);
    }
}
