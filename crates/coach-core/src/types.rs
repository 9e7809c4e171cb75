//! Data model for the evaluation pipeline.
//!
//! Everything here is created per request and dropped once the caller
//! has rendered or persisted it. Only [`SessionSummary`] outlives a
//! request, and only inside a history store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Placeholder the client sends when the candidate gave no answer.
pub const NO_ANSWER_PLACEHOLDER: &str = "No answer provided";

/// Label shown when the model did not return a usable score.
pub const SCORE_NOT_AVAILABLE: &str = "N/A";

/// Upper bound of the score scale.
pub const MAX_SCORE: f64 = 10.0;

/// Errors building an [`EvaluationRequest`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// A candidate's answer to a single interview question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EvaluationRequest {
    topic: String,
    question: String,
    answer: String,
}

impl EvaluationRequest {
    /// Create a request, rejecting blank fields.
    pub fn new(
        topic: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let request = Self {
            topic: topic.into(),
            question: question.into(),
            answer: answer.into(),
        };
        request.validate()?;
        Ok(request)
    }

    /// Create a request from optional parts, as they arrive from a client.
    pub fn from_parts(
        topic: Option<String>,
        question: Option<String>,
        answer: Option<String>,
    ) -> Result<Self, RequestError> {
        Self::new(
            topic.ok_or(RequestError::MissingField("topic"))?,
            question.ok_or(RequestError::MissingField("question"))?,
            answer.ok_or(RequestError::MissingField("answer"))?,
        )
    }

    /// Create a request for an unanswered question.
    pub fn unanswered(
        topic: impl Into<String>,
        question: impl Into<String>,
    ) -> Result<Self, RequestError> {
        Self::new(topic, question, NO_ANSWER_PLACEHOLDER)
    }

    fn validate(&self) -> Result<(), RequestError> {
        if self.topic.trim().is_empty() {
            return Err(RequestError::MissingField("topic"));
        }
        if self.question.trim().is_empty() {
            return Err(RequestError::MissingField("question"));
        }
        if self.answer.trim().is_empty() {
            return Err(RequestError::MissingField("answer"));
        }
        Ok(())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Whether the candidate skipped the question.
    pub fn is_unanswered(&self) -> bool {
        self.answer == NO_ANSWER_PLACEHOLDER
    }
}

/// The model's verdict on one answer, normalised for display.
///
/// Every field the model may omit has a neutral value: arrays are empty,
/// text is empty and the score is `None` (rendered as `N/A`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EvaluationResult {
    /// Score on a 0-10 scale, `None` when absent or invalid
    pub score: Option<f64>,

    /// Overall feedback
    #[serde(default)]
    pub feedback: String,

    /// Concrete mistakes in the answer
    #[serde(default)]
    pub mistakes: Vec<String>,

    /// Points a complete answer would cover
    #[serde(default)]
    pub missing_points: Vec<String>,

    /// A model answer
    #[serde(default)]
    pub perfect_answer: String,

    /// Suggested follow-up question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_question: Option<String>,
}

impl EvaluationResult {
    /// Normalise a parsed model response into an evaluation.
    ///
    /// Never fails: anything that is not an object yields the empty
    /// evaluation.
    pub fn from_value(value: &JsonValue) -> Self {
        Self {
            score: normalize_score(value.get("score")),
            feedback: text_field(value, "feedback").unwrap_or_default(),
            mistakes: string_list(value.get("mistakes")),
            missing_points: string_list(value.get("missing_points")),
            perfect_answer: text_field(value, "perfect_answer").unwrap_or_default(),
            next_question: text_field(value, "next_question"),
        }
    }

    /// Score formatted for display, e.g. `7/10` or `N/A`.
    pub fn score_label(&self) -> String {
        match self.score {
            Some(score) if score.fract() == 0.0 => format!("{}/10", score as u8),
            Some(score) => format!("{:.1}/10", score),
            None => SCORE_NOT_AVAILABLE.to_string(),
        }
    }
}

fn normalize_score(value: Option<&JsonValue>) -> Option<f64> {
    let score = match value? {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => {
            // Models sometimes answer "7" or "7/10"
            let s = s.trim();
            let s = s.strip_suffix("/10").unwrap_or(s).trim();
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };

    if score.is_finite() && (0.0..=MAX_SCORE).contains(&score) {
        Some(score)
    } else {
        None
    }
}

fn text_field(value: &JsonValue, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(JsonValue::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// One answered question inside a practice session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionResult {
    pub question: String,

    pub answer: String,

    #[serde(default)]
    pub evaluation: Option<EvaluationResult>,
}

/// A finished practice session, as handed to the history store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub topic: String,

    /// Free-form difficulty label chosen by the user (e.g. "medium")
    pub difficulty: String,

    pub total_questions: u32,

    #[serde(default)]
    pub results: Vec<QuestionResult>,

    /// When the session finished; defaults to the time of receipt
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl SessionSummary {
    /// Mean of the available scores, if any question was scored.
    pub fn average_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .results
            .iter()
            .filter_map(|r| r.evaluation.as_ref().and_then(|e| e.score))
            .collect();

        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_rejects_blank_fields() {
        assert_eq!(
            EvaluationRequest::new("  ", "What is OOP?", "Object."),
            Err(RequestError::MissingField("topic"))
        );
        assert_eq!(
            EvaluationRequest::new("Java", "", "Object."),
            Err(RequestError::MissingField("question"))
        );
        assert_eq!(
            EvaluationRequest::from_parts(Some("Java".into()), Some("Q".into()), None),
            Err(RequestError::MissingField("answer"))
        );
    }

    #[test]
    fn test_unanswered_request_is_valid() {
        let request = EvaluationRequest::unanswered("Java", "What is OOP?").unwrap();
        assert!(request.is_unanswered());
        assert_eq!(request.answer(), NO_ANSWER_PLACEHOLDER);
    }

    #[test]
    fn test_full_evaluation_normalises() {
        let value = json!({
            "score": 7,
            "feedback": "Solid start.",
            "mistakes": ["Confused class and object"],
            "missing_points": ["Encapsulation", "Polymorphism"],
            "perfect_answer": "OOP organises code around objects...",
            "next_question": "What is inheritance?"
        });

        let eval = EvaluationResult::from_value(&value);
        assert_eq!(eval.score, Some(7.0));
        assert_eq!(eval.feedback, "Solid start.");
        assert_eq!(eval.mistakes.len(), 1);
        assert_eq!(eval.missing_points.len(), 2);
        assert_eq!(eval.next_question.as_deref(), Some("What is inheritance?"));
        assert_eq!(eval.score_label(), "7/10");
    }

    #[test]
    fn test_missing_fields_get_neutral_values() {
        let eval = EvaluationResult::from_value(&json!({"feedback": "ok"}));
        assert_eq!(eval.score, None);
        assert_eq!(eval.score_label(), "N/A");
        assert!(eval.mistakes.is_empty());
        assert!(eval.missing_points.is_empty());
        assert!(eval.perfect_answer.is_empty());
        assert!(eval.next_question.is_none());
    }

    #[test]
    fn test_invalid_scores_are_not_available() {
        for bad in [json!(11), json!(-1), json!("high"), json!(null), json!([7])] {
            let eval = EvaluationResult::from_value(&json!({ "score": bad }));
            assert_eq!(eval.score, None, "score {:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_string_scores_are_accepted() {
        let eval = EvaluationResult::from_value(&json!({"score": "8/10"}));
        assert_eq!(eval.score, Some(8.0));

        let eval = EvaluationResult::from_value(&json!({"score": " 6.5 "}));
        assert_eq!(eval.score, Some(6.5));
        assert_eq!(eval.score_label(), "6.5/10");
    }

    #[test]
    fn test_list_fields_tolerate_odd_shapes() {
        let eval = EvaluationResult::from_value(&json!({
            "mistakes": "Only one mistake",
            "missing_points": ["a", 3, null, "  ", "b"]
        }));
        assert_eq!(eval.mistakes, vec!["Only one mistake"]);
        assert_eq!(eval.missing_points, vec!["a", "b"]);
    }

    #[test]
    fn test_non_object_yields_empty_evaluation() {
        assert_eq!(
            EvaluationResult::from_value(&json!("just text")),
            EvaluationResult::default()
        );
    }

    #[test]
    fn test_session_average_score() {
        let scored = |score: Option<f64>| QuestionResult {
            question: "Q".into(),
            answer: "A".into(),
            evaluation: Some(EvaluationResult {
                score,
                ..Default::default()
            }),
        };

        let session = SessionSummary {
            topic: "Java".into(),
            difficulty: "easy".into(),
            total_questions: 3,
            results: vec![scored(Some(6.0)), scored(None), scored(Some(8.0))],
            timestamp: Utc::now(),
        };
        assert_eq!(session.average_score(), Some(7.0));
    }

    #[test]
    fn test_session_timestamp_defaults() {
        let session: SessionSummary = serde_json::from_value(json!({
            "topic": "Rust",
            "difficulty": "hard",
            "total_questions": 5
        }))
        .unwrap();
        assert!(session.results.is_empty());
        assert_eq!(session.average_score(), None);
    }
}
