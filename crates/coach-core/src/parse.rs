//! Tolerant JSON parsing of model output.
//!
//! Models are told to answer with a bare JSON object but regularly wrap
//! it in prose or markdown fences. The parser tries the strict path first
//! and then falls back to the outermost brace-delimited block.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

lazy_static! {
    // First '{' through last '}', across newlines
    static ref BRACE_BLOCK: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

/// Why parsing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailure {
    /// Input was empty
    NoText,

    /// A `{...}` block exists but is not valid JSON
    InvalidBlock,

    /// No `{...}` block at all
    NotJson,
}

impl ParseFailure {
    pub fn message(&self) -> &'static str {
        match self {
            ParseFailure::NoText => "no text to parse",
            ParseFailure::InvalidBlock => "found JSON-like block but failed to parse",
            ParseFailure::NotJson => "response is not valid JSON",
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of [`parse_json`]. Parsing never panics and never errors
/// past this boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Success(JsonValue),
    Failure { reason: ParseFailure, raw: String },
}

impl ParseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseOutcome::Success(_))
    }

    /// The parsed value, if parsing succeeded.
    pub fn value(&self) -> Option<&JsonValue> {
        match self {
            ParseOutcome::Success(value) => Some(value),
            ParseOutcome::Failure { .. } => None,
        }
    }

    fn failure(reason: ParseFailure, raw: impl Into<String>) -> Self {
        ParseOutcome::Failure {
            reason,
            raw: raw.into(),
        }
    }
}

/// Parse model output that should be JSON but may be wrapped in text.
pub fn parse_json(text: &str) -> ParseOutcome {
    if text.is_empty() {
        return ParseOutcome::failure(ParseFailure::NoText, "");
    }

    if let Ok(value) = serde_json::from_str::<JsonValue>(text) {
        return ParseOutcome::Success(value);
    }

    let Some(block) = find_brace_block(text) else {
        tracing::warn!(len = text.len(), "Model output contains no JSON block");
        return ParseOutcome::failure(ParseFailure::NotJson, text);
    };

    match serde_json::from_str::<JsonValue>(block) {
        Ok(value) => {
            tracing::debug!(
                offset = text.find('{').unwrap_or(0),
                "Recovered JSON block from wrapped model output"
            );
            ParseOutcome::Success(value)
        }
        Err(e) => {
            tracing::warn!(error = %e, "JSON-like block failed to parse");
            ParseOutcome::failure(ParseFailure::InvalidBlock, block)
        }
    }
}

/// The substring from the first `{` to the last `}`, if both exist in order.
pub fn find_brace_block(text: &str) -> Option<&str> {
    BRACE_BLOCK.find(text).map(|m| m.as_str())
}
