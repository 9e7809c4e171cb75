//! # coach-core
//!
//! Deterministic pieces of the Interview Coach evaluation pipeline.
//!
//! A practice answer is scored by a remote language model. This crate
//! covers everything around that call that needs no I/O:
//! - the request and evaluation data model
//! - extracting the generated text from a provider response envelope
//! - tolerant parsing of "mostly JSON" model output
//! - normalising the parsed value into an [`EvaluationResult`]
//!
//! ## Key Guarantees
//!
//! 1. **No panics on model output**: extraction and parsing return
//!    `Option`/[`ParseOutcome`], never errors or panics
//! 2. **No I/O**: the remote call, retries and HTTP live in `coach-runtime`
//! 3. **Tolerant normalisation**: missing fields get neutral values
//!
//! ## Example
//!
//! ```rust
//! use coach_core::{interpret_response, Interpretation};
//! use serde_json::json;
//!
//! let response = json!({
//!     "candidates": [{"content": {"parts": [{"text": "{\"score\": 7, \"feedback\": \"ok\"}"}]}}]
//! });
//!
//! match interpret_response(&response) {
//!     Interpretation::Evaluated(eval) => assert_eq!(eval.score, Some(7.0)),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

pub mod extract;
pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types at crate root
pub use extract::{extract_text, ExtractionStrategy, PlainStringStrategy, PointerStrategy, TextExtractor};
pub use parse::{find_brace_block, parse_json, ParseFailure, ParseOutcome};
pub use schema::check_evaluation_shape;
pub use types::{
    EvaluationRequest, EvaluationResult, QuestionResult, RequestError, SessionSummary,
    NO_ANSWER_PLACEHOLDER, SCORE_NOT_AVAILABLE,
};

use serde_json::Value as JsonValue;

/// What a provider response turned out to contain.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// Text was found and parsed into an evaluation
    Evaluated(EvaluationResult),

    /// Text was found but is not JSON-shaped
    Unparseable { reason: ParseFailure, raw: String },

    /// No text could be located in the envelope
    NoText,
}

/// Run extraction, parsing and normalisation over a raw provider response.
pub fn interpret_response(response: &JsonValue) -> Interpretation {
    interpret_with(&TextExtractor::default(), response)
}

/// Like [`interpret_response`] with a caller-supplied extractor.
pub fn interpret_with(extractor: &TextExtractor, response: &JsonValue) -> Interpretation {
    let Some(text) = extractor.extract(response) else {
        return Interpretation::NoText;
    };

    match parse_json(&text) {
        ParseOutcome::Success(value) => {
            if let Err(violations) = check_evaluation_shape(&value) {
                tracing::warn!(
                    violations = ?violations,
                    "Model evaluation deviates from the requested shape"
                );
            }
            Interpretation::Evaluated(EvaluationResult::from_value(&value))
        }
        ParseOutcome::Failure { reason, raw } => Interpretation::Unparseable { reason, raw },
    }
}
