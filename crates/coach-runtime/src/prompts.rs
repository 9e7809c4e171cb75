//! Prompts for answer evaluation.
//!
//! The prompt is a pure function of the request: the same topic, question
//! and answer always produce the same text. The system prompt is constant
//! so providers with prompt caching can reuse it.

use coach_core::EvaluationRequest;

use crate::providers::ChatMessage;

/// System prompt shared by every evaluation.
pub const SYSTEM_PROMPT: &str = r#"
You are an experienced technical interviewer grading a candidate's answer.

Grade only the answer you are given, against the question you are given.
Be specific: name concrete mistakes and concrete missing points.
If the candidate gave no answer, score it 0 and explain what a good answer covers.

Respond with a single JSON object and nothing else. No markdown, no prose.
"#;

/// Fields the model is asked to return, in order.
pub const RESPONSE_FIELDS: [&str; 6] = [
    "score",
    "feedback",
    "mistakes",
    "missing_points",
    "perfect_answer",
    "next_question",
];

/// Output format section of the user prompt.
const OUTPUT_FORMAT: &str = r#"## Output Format (JSON)
{
  "score": number from 0 to 10,
  "feedback": "two or three sentences on the answer overall",
  "mistakes": ["each factual or conceptual error"],
  "missing_points": ["each important point the answer left out"],
  "perfect_answer": "a concise model answer",
  "next_question": "a follow-up question on the same topic"
}"#;

/// Build the user prompt for one answer.
pub fn build_evaluation_prompt(request: &EvaluationRequest) -> String {
    let answer_note = if request.is_unanswered() {
        "\n(The candidate did not answer this question.)"
    } else {
        ""
    };

    format!(
        "## Interview Topic\n{topic}\n\n## Question\n{question}\n\n## Candidate Answer\n{answer}{answer_note}\n\n{format}\n",
        topic = request.topic().trim(),
        question = request.question().trim(),
        answer = request.answer().trim(),
        answer_note = answer_note,
        format = OUTPUT_FORMAT,
    )
}

/// Messages sent to the provider for one answer.
pub fn evaluation_messages(request: &EvaluationRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT.trim()),
        ChatMessage::user(build_evaluation_prompt(request)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> EvaluationRequest {
        EvaluationRequest::new("Java", "What is OOP?", "Objects and classes").unwrap()
    }

    #[test]
    fn test_prompt_embeds_request() {
        let prompt = build_evaluation_prompt(&request());
        assert!(prompt.contains("Java"));
        assert!(prompt.contains("What is OOP?"));
        assert!(prompt.contains("Objects and classes"));
        assert!(!prompt.contains("did not answer"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_evaluation_prompt(&request()), build_evaluation_prompt(&request()));
    }

    #[test]
    fn test_prompt_names_every_field() {
        let prompt = build_evaluation_prompt(&request());
        for field in RESPONSE_FIELDS {
            assert!(prompt.contains(&format!("\"{}\"", field)), "missing {}", field);
        }
    }

    #[test]
    fn test_unanswered_prompt() {
        let request = EvaluationRequest::unanswered("Rust", "What is a lifetime?").unwrap();
        let prompt = build_evaluation_prompt(&request);
        assert!(prompt.contains("did not answer"));
    }

    #[test]
    fn test_messages_roles() {
        let messages = evaluation_messages(&request());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("JSON"));
        assert_eq!(messages[1].role, "user");
    }
}
