//! Evaluation orchestrator.
//!
//! Runs one answer through the pipeline:
//! 1. Validate the input (no remote call on failure)
//! 2. Serve from cache if one is enabled and the same answer was graded recently
//! 3. Build the prompt and call the provider under the retry controller
//! 4. Extract and parse the generated text (`coach-core`)
//! 5. Map the outcome to exactly one [`EvaluationResponse`]
//!
//! Every failure path ends in a response value. Nothing here panics or
//! returns an error to the HTTP layer.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use coach_core::{
    interpret_with, EvaluationRequest, EvaluationResult, Interpretation, ParseFailure,
    RequestError, TextExtractor,
};

use crate::cache::EvaluationCache;
use crate::config::RuntimeConfig;
use crate::prompts::evaluation_messages;
use crate::providers::{CompletionConfig, LlmProvider, ProviderError, ProviderRegistry};
use crate::resilience::{with_retries, RetryError, RetryPolicy};

/// Message returned for missing or blank input fields.
pub const MISSING_FIELDS_MESSAGE: &str = "Missing topic, question, or answer";

/// Message returned when the model response has no text in it.
pub const BAD_GATEWAY_MESSAGE: &str = "Invalid response from AI service";

/// Message returned when the retry budget is exhausted.
pub const UNAVAILABLE_MESSAGE: &str = "AI service is temporarily unavailable, please retry later";

/// Message returned for any other failure.
pub const SERVER_ERROR_MESSAGE: &str = "Failed to evaluate answer";

/// Longest raw-response excerpt included in a bad-gateway response.
const DEBUG_SNIPPET_CHARS: usize = 500;

/// Why an evaluation did not produce a result.
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// Missing or blank field; no remote call was made
    #[error("Missing topic, question, or answer: {0}")]
    ClientInput(#[from] RequestError),

    /// The response arrived but no text could be located in it
    #[error("No text found in provider response")]
    UpstreamShape { debug: String },

    /// Text arrived but is not JSON-shaped
    #[error("Could not parse model output: {reason}")]
    UpstreamParse { reason: ParseFailure, raw: String },

    /// Rate-limited on every attempt
    #[error("Provider overloaded after {attempts} attempts: {last}")]
    UpstreamOverload { attempts: u32, last: ProviderError },

    /// Any other provider failure; not retried
    #[error("Provider call failed: {0}")]
    UpstreamFatal(ProviderError),
}

impl From<RetryError<ProviderError>> for EvaluationError {
    fn from(err: RetryError<ProviderError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => {
                EvaluationError::UpstreamOverload { attempts, last }
            }
            RetryError::Fatal(e) => EvaluationError::UpstreamFatal(e),
        }
    }
}

/// Evaluation input as received from a client. Any field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EvaluateInput {
    pub topic: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
}

impl EvaluateInput {
    pub fn new(
        topic: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            topic: Some(topic.into()),
            question: Some(question.into()),
            answer: Some(answer.into()),
        }
    }

    /// Validate into a request.
    pub fn into_request(self) -> Result<EvaluationRequest, RequestError> {
        EvaluationRequest::from_parts(self.topic, self.question, self.answer)
    }
}

/// The single outcome of an evaluation, one variant per response shape.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationResponse {
    /// The model's evaluation
    Success(EvaluationResult),

    /// Input was missing a field
    ClientError { message: String },

    /// The provider broke its response contract
    BadGateway { message: String, debug: String },

    /// The model answered, but not in JSON; raw text kept for display
    ParseFailure { reason: ParseFailure, raw: String },

    /// Rate-limited past the retry budget
    ServiceUnavailable { message: String },

    /// Any other failure
    ServerError { message: String },
}

impl EvaluationResponse {
    /// HTTP status for this response.
    ///
    /// Parse failures are a 200: the request itself succeeded and the raw
    /// text is still useful to the user.
    pub fn status_code(&self) -> u16 {
        match self {
            EvaluationResponse::Success(_) => 200,
            EvaluationResponse::ParseFailure { .. } => 200,
            EvaluationResponse::ClientError { .. } => 400,
            EvaluationResponse::ServerError { .. } => 500,
            EvaluationResponse::BadGateway { .. } => 502,
            EvaluationResponse::ServiceUnavailable { .. } => 503,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EvaluationResponse::Success(_))
    }

    /// JSON body for this response.
    pub fn to_json(&self) -> JsonValue {
        match self {
            EvaluationResponse::Success(evaluation) => json!({ "evaluation": evaluation }),
            EvaluationResponse::ParseFailure { reason, raw } => json!({
                "evaluation": null,
                "raw": raw,
                "parse_error": reason.message(),
            }),
            EvaluationResponse::BadGateway { message, debug } => json!({
                "error": message,
                "debug": debug,
            }),
            EvaluationResponse::ClientError { message }
            | EvaluationResponse::ServiceUnavailable { message }
            | EvaluationResponse::ServerError { message } => json!({ "error": message }),
        }
    }
}

impl From<EvaluationError> for EvaluationResponse {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::ClientInput(_) => EvaluationResponse::ClientError {
                message: MISSING_FIELDS_MESSAGE.to_string(),
            },
            EvaluationError::UpstreamShape { debug } => EvaluationResponse::BadGateway {
                message: BAD_GATEWAY_MESSAGE.to_string(),
                debug,
            },
            EvaluationError::UpstreamParse { reason, raw } => {
                EvaluationResponse::ParseFailure { reason, raw }
            }
            EvaluationError::UpstreamOverload { .. } => EvaluationResponse::ServiceUnavailable {
                message: UNAVAILABLE_MESSAGE.to_string(),
            },
            EvaluationError::UpstreamFatal(_) => EvaluationResponse::ServerError {
                message: SERVER_ERROR_MESSAGE.to_string(),
            },
        }
    }
}

/// Grades answers by calling a model provider.
///
/// Holds no per-request state; one instance is shared by all requests.
pub struct Evaluator {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    retry: RetryPolicy,
    extractor: TextExtractor,
    cache: Option<EvaluationCache>,
}

impl Evaluator {
    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::new()
    }

    /// Build the configured provider from the registry and wrap it.
    pub fn from_config(
        config: RuntimeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, ProviderError> {
        let provider = registry.create(&config.provider.provider_type, &config.provider.as_json())?;
        Self::builder().provider(provider).config(config).build()
    }

    /// Name of the underlying provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn provider_healthy(&self) -> bool {
        self.provider.health_check().await
    }

    /// Evaluate client input into a response.
    pub async fn evaluate(&self, input: EvaluateInput) -> EvaluationResponse {
        let request = match input.into_request() {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected evaluation input");
                return EvaluationError::from(e).into();
            }
        };

        match self.evaluate_request(&request).await {
            Ok(evaluation) => EvaluationResponse::Success(evaluation),
            Err(e) => {
                match &e {
                    EvaluationError::UpstreamFatal(_) | EvaluationError::UpstreamShape { .. } => {
                        tracing::error!(error = %e, topic = request.topic(), "Evaluation failed")
                    }
                    _ => tracing::warn!(error = %e, topic = request.topic(), "Evaluation failed"),
                }
                e.into()
            }
        }
    }

    /// Evaluate a validated request.
    pub async fn evaluate_request(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, EvaluationError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(request).await {
                tracing::debug!(topic = request.topic(), "Evaluation served from cache");
                return Ok(hit);
            }
        }

        let messages = evaluation_messages(request);
        tracing::debug!(
            provider = self.provider.name(),
            model = %self.completion.model,
            topic = request.topic(),
            "Requesting evaluation"
        );

        let response = with_retries(&self.retry, || {
            self.provider.generate(messages.clone(), &self.completion)
        })
        .await?;

        let evaluation = match interpret_with(&self.extractor, &response) {
            Interpretation::Evaluated(evaluation) => evaluation,
            Interpretation::Unparseable { reason, raw } => {
                return Err(EvaluationError::UpstreamParse { reason, raw });
            }
            Interpretation::NoText => {
                return Err(EvaluationError::UpstreamShape {
                    debug: debug_snippet(&response),
                });
            }
        };

        if let Some(cache) = &self.cache {
            cache.insert(request.clone(), evaluation.clone()).await;
        }

        Ok(evaluation)
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("provider", &self.provider.name())
            .field("model", &self.completion.model)
            .field("retry", &self.retry)
            .field("extractor", &self.extractor)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Leading part of the raw response, for diagnosing envelope changes.
fn debug_snippet(response: &JsonValue) -> String {
    let text = response.to_string();
    if text.chars().count() <= DEBUG_SNIPPET_CHARS {
        return text;
    }
    let mut snippet: String = text.chars().take(DEBUG_SNIPPET_CHARS).collect();
    snippet.push_str("...");
    snippet
}

/// Builder for [`Evaluator`].
pub struct EvaluatorBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    config: RuntimeConfig,
    extractor: Option<TextExtractor>,
}

impl EvaluatorBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            config: RuntimeConfig::default(),
            extractor: None,
        }
    }

    /// Set the model provider.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the configuration (completion, retry and cache sections are used).
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Replace the default text extractor.
    pub fn extractor(mut self, extractor: TextExtractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn build(self) -> Result<Evaluator, ProviderError> {
        let provider = self
            .provider
            .ok_or_else(|| ProviderError::NotConfigured("No provider set".to_string()))?;

        Ok(Evaluator {
            provider,
            cache: EvaluationCache::from_config(&self.config.cache),
            completion: self.config.completion,
            retry: self.config.retry,
            extractor: self.extractor.unwrap_or_default(),
        })
    }
}

impl Default for EvaluatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
