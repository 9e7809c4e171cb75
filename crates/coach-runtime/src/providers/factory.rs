//! Provider registration by type name.
//!
//! The configuration names a provider type (`provider.type`); the
//! registry maps that name to a factory which builds the provider from
//! the remaining provider settings.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create("gemini", &json!({"api_key": "..."}))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{LlmProvider, ProviderError};

/// Builds providers of one type from JSON settings.
pub trait ProviderFactory: Send + Sync {
    /// Unique identifier, matched against `provider.type`.
    fn provider_type(&self) -> &'static str;

    /// Create a provider instance.
    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Validate settings without creating a provider.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError>;
}

/// Registry of available provider factories.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any with the same type.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    /// Create a provider from type name and settings.
    pub fn create(
        &self,
        provider_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let factory = self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.available_types()
            ))
        })?;
        factory.validate_config(config)?;
        let provider = factory.create(config)?;
        tracing::info!(provider = provider.name(), "Provider created");
        Ok(provider)
    }

    /// Validate settings for a provider type.
    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), ProviderError> {
        self.factories
            .get(provider_type)
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!("Unknown provider type: '{}'", provider_type))
            })?
            .validate_config(config)
    }

    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    /// Registry with every provider compiled into this build.
    #[cfg(feature = "gemini")]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::GeminiProviderFactory));
        registry
    }

    /// Registry with every provider compiled into this build.
    #[cfg(not(feature = "gemini"))]
    pub fn with_defaults() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionConfig};
    use async_trait::async_trait;

    struct MockProvider {
        name: String,
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn generate(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<JsonValue, ProviderError> {
            Ok(serde_json::json!({"text": "{}"}))
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct MockProviderFactory;

    impl ProviderFactory for MockProviderFactory {
        fn provider_type(&self) -> &'static str {
            "mock"
        }

        fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            let name = config["name"].as_str().unwrap_or("mock-provider").to_string();
            Ok(Arc::new(MockProvider { name }))
        }

        fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
            if config["reject"].as_bool() == Some(true) {
                return Err(ProviderError::NotConfigured("rejected".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_registry_register_and_create() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProviderFactory));

        assert!(registry.has_provider("mock"));
        assert!(!registry.has_provider("unknown"));

        let provider = registry
            .create("mock", &serde_json::json!({"name": "test-mock"}))
            .unwrap();
        assert_eq!(provider.name(), "test-mock");
    }

    #[test]
    fn test_registry_unknown_provider() {
        let registry = ProviderRegistry::new();
        match registry.create("unknown", &serde_json::json!({})) {
            Err(ProviderError::NotConfigured(msg)) => {
                assert!(msg.contains("Unknown provider type"));
            }
            _ => panic!("Expected NotConfigured error"),
        }
    }

    #[test]
    fn test_create_validates_first() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProviderFactory));
        let result = registry.create("mock", &serde_json::json!({"reject": true}));
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn test_registry_available_types() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.available_types().is_empty());

        registry.register(Arc::new(MockProviderFactory));
        assert_eq!(registry.available_types(), vec!["mock"]);
        assert!(registry.validate("mock", &serde_json::json!({})).is_ok());
        assert!(registry.validate("unknown", &serde_json::json!({})).is_err());
    }

    #[cfg(feature = "gemini")]
    #[test]
    fn test_defaults_include_gemini() {
        assert!(ProviderRegistry::with_defaults().has_provider("gemini"));
    }
}
