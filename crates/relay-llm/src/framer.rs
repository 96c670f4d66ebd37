//! Building OpenAI-shaped completions, chunks and error envelopes

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::CanonicalModel;
use crate::prompt::AssembledPrompt;
use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiErrorDetail, OpenAiErrorResponse, OpenAiResponse, OpenAiStreamChoice,
    OpenAiStreamChunk, OpenAiStreamDelta, OpenAiUsage,
};

/// Payload of the frame that terminates every SSE stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Finish reason reported for every completed answer
pub const FINISH_REASON_STOP: &str = "stop";

const ASSISTANT_ROLE: &str = "assistant";

/// Generate a completion identifier
///
/// Derived from the current time plus a process-local counter, so ids are
/// distinct within one process but carry no global uniqueness guarantee.
pub fn completion_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("chatcmpl-{nanos}{:04}", count % 10_000)
}

/// Current time in unix seconds
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Rough token estimate: four characters per token
fn estimate_tokens(chars: usize) -> u32 {
    u32::try_from(chars / 4).unwrap_or(u32::MAX)
}

/// Approximate usage for a prompt and the text produced for it
pub fn estimate_usage(prompt: &AssembledPrompt, output: &str) -> OpenAiUsage {
    let prompt_tokens = estimate_tokens(prompt.char_count());
    let completion_tokens = estimate_tokens(output.chars().count());

    OpenAiUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens.saturating_add(completion_tokens),
    }
}

/// Full non-streaming completion with a single assistant choice
pub fn completion(model: &CanonicalModel, content: String, usage: OpenAiUsage) -> OpenAiResponse {
    OpenAiResponse {
        id: completion_id(),
        object: "chat.completion".to_owned(),
        created: unix_timestamp(),
        model: model.to_string(),
        choices: vec![OpenAiChoice {
            index: 0,
            message: OpenAiChoiceMessage {
                role: ASSISTANT_ROLE.to_owned(),
                content,
            },
            finish_reason: Some(FINISH_REASON_STOP.to_owned()),
        }],
        usage: Some(usage),
    }
}

/// Error envelope body
pub fn error_body(message: impl Into<String>) -> OpenAiErrorResponse {
    OpenAiErrorResponse {
        error: OpenAiErrorDetail {
            message: message.into(),
            error_type: relay_core::ERROR_TYPE.to_owned(),
        },
    }
}

/// Builds the chunks of one stream, all sharing an id and timestamp
#[derive(Debug, Clone)]
pub struct ChunkFramer {
    id: String,
    created: u64,
    model: String,
}

impl ChunkFramer {
    pub fn new(model: &CanonicalModel) -> Self {
        Self::with_identity(completion_id(), unix_timestamp(), model)
    }

    pub fn with_identity(id: String, created: u64, model: &CanonicalModel) -> Self {
        Self {
            id,
            created,
            model: model.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn created(&self) -> u64 {
        self.created
    }

    /// Chunk announcing the assistant role, with no content
    pub fn role(&self) -> OpenAiStreamChunk {
        self.chunk(
            OpenAiStreamDelta {
                role: Some(ASSISTANT_ROLE.to_owned()),
                content: None,
            },
            None,
        )
    }

    /// Chunk carrying a content fragment
    pub fn content(&self, text: &str) -> OpenAiStreamChunk {
        self.chunk(
            OpenAiStreamDelta {
                role: None,
                content: Some(text.to_owned()),
            },
            None,
        )
    }

    /// Chunk carrying both the role and the complete answer
    pub fn role_with_content(&self, text: &str) -> OpenAiStreamChunk {
        self.chunk(
            OpenAiStreamDelta {
                role: Some(ASSISTANT_ROLE.to_owned()),
                content: Some(text.to_owned()),
            },
            None,
        )
    }

    /// Terminal chunk with an empty delta and `finish_reason = "stop"`
    pub fn stop(&self) -> OpenAiStreamChunk {
        self.chunk(OpenAiStreamDelta::default(), Some(FINISH_REASON_STOP))
    }

    fn chunk(&self, delta: OpenAiStreamDelta, finish_reason: Option<&str>) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_owned(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![OpenAiStreamChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_owned),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::ChatMessage;

    #[test]
    fn ids_are_distinct() {
        let first = completion_id();
        let second = completion_id();

        assert!(first.starts_with("chatcmpl-"));
        assert_ne!(first, second);
    }

    #[test]
    fn usage_is_a_quarter_of_characters() {
        let prompt = AssembledPrompt::assemble(&[ChatMessage::system("abcd"), ChatMessage::user("efghijk")]);
        let usage = estimate_usage(&prompt, "0123456789");

        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 2);
        assert_eq!(usage.total_tokens, 5);
    }

    #[test]
    fn completion_shape() {
        let usage = OpenAiUsage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
        };
        let response = completion(&CanonicalModel::Opus, "Hi there".to_owned(), usage);
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["object"], "chat.completion");
        assert_eq!(value["model"], "opus");
        assert_eq!(
            value["choices"],
            json!([{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi there"},
                "finish_reason": "stop"
            }])
        );
        assert_eq!(
            value["usage"],
            json!({"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3})
        );
    }

    #[test]
    fn chunk_deltas() {
        let framer = ChunkFramer::with_identity("chatcmpl-1".to_owned(), 42, &CanonicalModel::Haiku);

        let role = serde_json::to_value(framer.role()).unwrap();
        assert_eq!(
            role,
            json!({
                "id": "chatcmpl-1",
                "object": "chat.completion.chunk",
                "created": 42,
                "model": "haiku",
                "choices": [{"index": 0, "delta": {"role": "assistant"}, "finish_reason": null}]
            })
        );

        let content = serde_json::to_value(framer.content("Hel")).unwrap();
        assert_eq!(content["choices"][0]["delta"], json!({"content": "Hel"}));

        let both = serde_json::to_value(framer.role_with_content("Hello")).unwrap();
        assert_eq!(both["choices"][0]["delta"], json!({"role": "assistant", "content": "Hello"}));

        let stop = serde_json::to_value(framer.stop()).unwrap();
        assert_eq!(stop["choices"][0]["delta"], json!({}));
        assert_eq!(stop["choices"][0]["finish_reason"], "stop");
        assert!(stop.get("usage").is_none());
    }

    #[test]
    fn error_envelope() {
        let body = serde_json::to_value(error_body("Invalid API key")).unwrap();
        assert_eq!(body, json!({"error": {"message": "Invalid API key", "type": "error"}}));
    }
}
