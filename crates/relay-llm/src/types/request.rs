use super::message::ChatMessage;

/// A chat completion request as Relay understands it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    /// Model name exactly as the client sent it (possibly empty)
    pub model: String,
    /// Conversation in client order
    pub messages: Vec<ChatMessage>,
    /// Whether the client asked for an SSE stream
    pub stream: bool,
}
