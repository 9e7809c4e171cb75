//! # coach-runtime
//!
//! Async side of Interview Coach: calls the model, retries on rate
//! limits and serves the HTTP API.
//!
//! `coach-core` decides what a model response means; this crate gets the
//! response. The only remote calls are made through [`LlmProvider`].
//!
//! ## Pipeline
//!
//! ```text
//! Evaluator ─► with_retries ─► LlmProvider::generate
//!     │
//!     └─► coach_core::interpret_with ─► EvaluationResponse
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use coach_runtime::{Evaluator, EvaluateInput, ProviderRegistry, RuntimeConfig};
//!
//! let config = RuntimeConfig::load(None)?;
//! let evaluator = Evaluator::from_config(config, &ProviderRegistry::with_defaults())?;
//!
//! let response = evaluator
//!     .evaluate(EvaluateInput::new("Java", "What is OOP?", "Objects and classes"))
//!     .await;
//! println!("{} {}", response.status_code(), response.to_json());
//! ```

pub mod cache;
pub mod config;
pub mod history;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod server;

pub use cache::EvaluationCache;
pub use config::{CacheConfig, ConfigError, ProviderSettings, RuntimeConfig, ServerConfig};
pub use history::{HistoryError, HistoryStore, InMemoryHistory};
pub use orchestrator::{
    EvaluateInput, EvaluationError, EvaluationResponse, Evaluator, EvaluatorBuilder,
};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, LlmProvider, ProviderError, ProviderFactory,
    ProviderRegistry,
};
pub use resilience::{with_retries, RetryError, RetryPolicy, Retryable};
pub use server::{router, serve, AppState};

#[cfg(feature = "gemini")]
pub use providers::{GeminiProvider, GeminiProviderFactory};
