//! Conversion from the `OpenAI` wire format to internal types

use crate::protocol::openai::{OpenAiContent, OpenAiMessage, OpenAiRequest};
use crate::types::{ChatMessage, ChatRequest, Role};

impl From<OpenAiRequest> for ChatRequest {
    fn from(req: OpenAiRequest) -> Self {
        Self {
            model: req.model.unwrap_or_default(),
            messages: req
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(into_chat_message)
                .collect(),
            stream: req.stream.unwrap_or(false),
        }
    }
}

/// Convert one wire message, dropping roles the backend cannot express
fn into_chat_message(msg: OpenAiMessage) -> Option<ChatMessage> {
    let wire_role = msg.role.unwrap_or_default();
    let Some(role) = Role::from_wire(&wire_role) else {
        tracing::debug!(role = %wire_role, "ignoring message with unsupported role");
        return None;
    };

    Some(ChatMessage::new(role, flatten_content(msg.content)))
}

/// Concatenate text parts; non-text parts and missing content become empty
fn flatten_content(content: Option<OpenAiContent>) -> String {
    match content {
        Some(OpenAiContent::Text(text)) => text,
        Some(OpenAiContent::Parts(parts)) => parts
            .into_iter()
            .filter(|part| part.part_type == "text")
            .filter_map(|part| part.text)
            .collect(),
        None => String::new(),
    }
}
