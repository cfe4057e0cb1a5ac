//! Bounded-retry repair loop for structured LLM output.
//!
//! Attempt → Validate → RetryWithFeedback → (Done | Failed). A failed validation
//! sends the model its own reply plus the error and asks again, up to `max_attempts`.
//! Transport errors are not retried here; `ChatBackend` owns transport retries.

use serde::de::DeserializeOwned;
use tracing::warn;

use super::prompts::json_repair_feedback;
use super::{ChatBackend, ChatMessage, LlmError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

enum RepairState<T> {
    Attempt {
        attempt: u32,
        messages: Vec<ChatMessage>,
    },
    Validate {
        attempt: u32,
        messages: Vec<ChatMessage>,
        reply: String,
    },
    RetryWithFeedback {
        attempt: u32,
        messages: Vec<ChatMessage>,
        reply: String,
        error: String,
    },
    Done(T),
    Failed {
        attempts: u32,
        error: String,
    },
}

/// Runs the repair state machine until `validate` accepts a reply or attempts run out.
pub async fn complete_validated<T, F>(
    backend: &dyn ChatBackend,
    model: &str,
    system: &str,
    prompt: &str,
    max_attempts: u32,
    validate: F,
) -> Result<T, LlmError>
where
    F: Fn(&str) -> Result<T, String> + Send + Sync,
    T: Send,
{
    let max_attempts = max_attempts.max(1);
    let mut state = RepairState::Attempt {
        attempt: 1,
        messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
    };

    loop {
        state = match state {
            RepairState::Attempt { attempt, messages } => {
                let reply = backend.complete(model, &messages).await?;
                RepairState::Validate {
                    attempt,
                    messages,
                    reply,
                }
            }
            RepairState::Validate {
                attempt,
                messages,
                reply,
            } => match validate(&reply) {
                Ok(value) => RepairState::Done(value),
                Err(error) if attempt < max_attempts => RepairState::RetryWithFeedback {
                    attempt,
                    messages,
                    reply,
                    error,
                },
                Err(error) => RepairState::Failed {
                    attempts: attempt,
                    error,
                },
            },
            RepairState::RetryWithFeedback {
                attempt,
                mut messages,
                reply,
                error,
            } => {
                warn!(
                    "Structured output attempt {}/{} rejected: {}",
                    attempt, max_attempts, error
                );
                messages.push(ChatMessage::assistant(reply));
                messages.push(ChatMessage::user(json_repair_feedback(&error)));
                RepairState::Attempt {
                    attempt: attempt + 1,
                    messages,
                }
            }
            RepairState::Done(value) => return Ok(value),
            RepairState::Failed { attempts, error } => {
                return Err(LlmError::Malformed {
                    attempts,
                    last_error: error,
                })
            }
        };
    }
}

/// Parses a JSON reply, tolerating code fences and prose around the payload.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let stripped = strip_json_fences(text);
    match serde_json::from_str(stripped) {
        Ok(value) => Ok(value),
        Err(first_err) => match extract_json_block(stripped) {
            Some(block) if block.len() != stripped.len() => {
                serde_json::from_str(block).map_err(|e| e.to_string())
            }
            _ => Err(first_err.to_string()),
        },
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Widest `{...}` or `[...]` span, whichever opens first.
fn extract_json_block(text: &str) -> Option<&str> {
    let open = text.find(['{', '['])?;
    let close_char = if text[open..].starts_with('{') { '}' } else { ']' };
    let close = text.rfind(close_char)?;
    (close > open).then(|| &text[open..=close])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::Deserialize;

    use super::*;
    use crate::llm_client::testing::ScriptedBackend;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Label {
        industry: String,
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_json_reply_ignores_surrounding_prose() {
        let reply = "Sure! Here is the result:\n{\"industry\": \"Retail\"}\nHope this helps.";
        let label: Label = parse_json_reply(reply).unwrap();
        assert_eq!(label.industry, "Retail");
    }

    #[test]
    fn test_parse_json_reply_handles_arrays() {
        let reply = "Bullets: [\"a\", \"b\"]";
        let bullets: Vec<String> = parse_json_reply(reply).unwrap();
        assert_eq!(bullets, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_json_reply_reports_error_without_json() {
        let result: Result<Label, String> = parse_json_reply("no json here");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_valid_first_reply_needs_one_call() {
        let backend = ScriptedBackend::new();
        backend.push("{\"industry\": \"Energy\"}");
        let label: Label = complete_validated(
            backend.as_ref(),
            "m",
            "sys",
            "classify",
            DEFAULT_MAX_ATTEMPTS,
            parse_json_reply::<Label>,
        )
        .await
        .unwrap();
        assert_eq!(label.industry, "Energy");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_retried_with_feedback() {
        let backend = ScriptedBackend::new();
        backend.push("industry: Energy").push("{\"industry\": \"Energy\"}");
        let label: Label = complete_validated(
            backend.as_ref(),
            "m",
            "sys",
            "classify",
            DEFAULT_MAX_ATTEMPTS,
            parse_json_reply::<Label>,
        )
        .await
        .unwrap();
        assert_eq!(label.industry, "Energy");
        assert_eq!(backend.call_count(), 2);

        let retry = backend.last_call();
        assert_eq!(retry.len(), 4, "system, user, assistant echo, feedback");
        assert_eq!(retry[2], ChatMessage::assistant("industry: Energy"));
        assert_eq!(retry[3].role, "user");
    }

    #[tokio::test]
    async fn test_gives_up_after_attempt_budget() {
        let backend = ScriptedBackend::new();
        backend.push("nope").push("still nope").push("{\"industry\": \"late\"}");
        let result: Result<Label, LlmError> = complete_validated(
            backend.as_ref(),
            "m",
            "sys",
            "classify",
            2,
            parse_json_reply::<Label>,
        )
        .await;
        assert!(matches!(result, Err(LlmError::Malformed { attempts: 2, .. })));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_validator_rejection_counts_as_malformed() {
        let backend: Arc<ScriptedBackend> = ScriptedBackend::new();
        backend.push("{\"industry\": \"\"}").push("{\"industry\": \"Media\"}");
        let label = complete_validated(backend.as_ref(), "m", "sys", "classify", 3, |reply| {
            let label: Label = parse_json_reply(reply)?;
            if label.industry.is_empty() {
                return Err("industry must not be empty".to_string());
            }
            Ok(label)
        })
        .await
        .unwrap();
        assert_eq!(label.industry, "Media");
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let backend = ScriptedBackend::new();
        let result: Result<Label, LlmError> = complete_validated(
            backend.as_ref(),
            "m",
            "sys",
            "classify",
            3,
            parse_json_reply::<Label>,
        )
        .await;
        assert!(matches!(result, Err(LlmError::EmptyContent)));
        assert_eq!(backend.call_count(), 1);
    }
}
