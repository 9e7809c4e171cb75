//! Text extraction from provider response envelopes.
//!
//! Providers wrap the generated text in envelopes whose shape drifts
//! between API versions. Extraction walks an ordered list of strategies
//! and returns the first non-empty match.
//!
//! | Order | Shape |
//! |-------|-------|
//! | 1 | `candidates[0].content.parts[0].text` |
//! | 2 | `candidates[0].content.text` |
//! | 3 | `output[0].content[0].text` |
//! | 4 | the response is itself a string |
//! | 5 | top-level `text` |

use serde_json::Value as JsonValue;

/// One known way of finding the generated text in a response.
///
/// Implementations must not panic on unexpected shapes; a miss is `None`.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Return the text this strategy recognises, if any.
    fn extract<'a>(&self, response: &'a JsonValue) -> Option<&'a str>;
}

/// Strategy that follows a JSON pointer to a string.
#[derive(Debug, Clone, Copy)]
pub struct PointerStrategy {
    name: &'static str,
    pointer: &'static str,
}

impl PointerStrategy {
    pub const fn new(name: &'static str, pointer: &'static str) -> Self {
        Self { name, pointer }
    }
}

impl ExtractionStrategy for PointerStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extract<'a>(&self, response: &'a JsonValue) -> Option<&'a str> {
        response.pointer(self.pointer).and_then(JsonValue::as_str)
    }
}

/// Strategy for responses that are already plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainStringStrategy;

impl ExtractionStrategy for PlainStringStrategy {
    fn name(&self) -> &'static str {
        "plain_string"
    }

    fn extract<'a>(&self, response: &'a JsonValue) -> Option<&'a str> {
        response.as_str()
    }
}

/// Gemini-style `candidates[0].content.parts[0].text`.
pub const CANDIDATE_PARTS: PointerStrategy =
    PointerStrategy::new("candidate_parts", "/candidates/0/content/parts/0/text");

/// Flattened `candidates[0].content.text`.
pub const CANDIDATE_CONTENT: PointerStrategy =
    PointerStrategy::new("candidate_content", "/candidates/0/content/text");

/// Responses-API style `output[0].content[0].text`.
pub const OUTPUT_ARRAY: PointerStrategy =
    PointerStrategy::new("output_array", "/output/0/content/0/text");

/// Top-level `text`.
pub const TOP_LEVEL_TEXT: PointerStrategy = PointerStrategy::new("top_level_text", "/text");

/// Ordered, first-match-wins text extractor.
pub struct TextExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl TextExtractor {
    /// Extractor with no strategies; everything misses.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy after the existing ones.
    pub fn with_strategy(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Extract the generated text, or `None` if no strategy matched.
    pub fn extract(&self, response: &JsonValue) -> Option<String> {
        for strategy in &self.strategies {
            if let Some(text) = strategy.extract(response).filter(|t| !t.is_empty()) {
                tracing::debug!(strategy = strategy.name(), len = text.len(), "Extracted model text");
                return Some(text.to_string());
            }
        }

        tracing::debug!(strategies = self.strategies.len(), "No extraction strategy matched");
        None
    }

    /// Names of the registered strategies, in priority order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::empty()
            .with_strategy(CANDIDATE_PARTS)
            .with_strategy(CANDIDATE_CONTENT)
            .with_strategy(OUTPUT_ARRAY)
            .with_strategy(PlainStringStrategy)
            .with_strategy(TOP_LEVEL_TEXT)
    }
}

impl std::fmt::Debug for TextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextExtractor")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

/// Extract text with the default strategy order.
pub fn extract_text(response: &JsonValue) -> Option<String> {
    TextExtractor::default().extract(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_parts() {
        let response = json!({"candidates": [{"content": {"parts": [{"text": "X"}]}}]});
        assert_eq!(extract_text(&response).as_deref(), Some("X"));
    }

    #[test]
    fn test_empty_object_is_none() {
        assert_eq!(extract_text(&json!({})), None);
        assert_eq!(extract_text(&json!(null)), None);
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(extract_text(&json!("X")).as_deref(), Some("X"));
        assert_eq!(extract_text(&json!("")), None);
    }

    #[test]
    fn test_flat_candidate_content() {
        let response = json!({"candidates": [{"content": {"text": "flat"}}]});
        assert_eq!(extract_text(&response).as_deref(), Some("flat"));
    }

    #[test]
    fn test_output_array() {
        let response = json!({"output": [{"content": [{"type": "output_text", "text": "out"}]}]});
        assert_eq!(extract_text(&response).as_deref(), Some("out"));
    }

    #[test]
    fn test_top_level_text() {
        assert_eq!(extract_text(&json!({"text": "top"})).as_deref(), Some("top"));
    }

    #[test]
    fn test_priority_order() {
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": "first"}]}}],
            "text": "last"
        });
        assert_eq!(extract_text(&response).as_deref(), Some("first"));
    }

    #[test]
    fn test_empty_match_falls_through() {
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": ""}]}}],
            "text": "fallback"
        });
        assert_eq!(extract_text(&response).as_deref(), Some("fallback"));
    }

    #[test]
    fn test_wrong_intermediate_types_do_not_panic() {
        let shapes = [
            json!({"candidates": "nope"}),
            json!({"candidates": []}),
            json!({"candidates": [null]}),
            json!({"candidates": [{"content": {"parts": {"text": "not an array"}}}]}),
            json!({"output": [{"content": 5}]}),
            json!({"text": 42}),
            json!([1, 2, 3]),
        ];
        for shape in shapes {
            assert_eq!(extract_text(&shape), None, "shape {} should not match", shape);
        }
    }

    #[test]
    fn test_custom_strategy_appended() {
        let extractor =
            TextExtractor::default().with_strategy(PointerStrategy::new("message", "/message/content"));
        let response = json!({"message": {"content": "custom"}});
        assert_eq!(extractor.extract(&response).as_deref(), Some("custom"));
        assert_eq!(extractor.strategy_names().last(), Some(&"message"));
    }
}
