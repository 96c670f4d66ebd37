//! Flattening a chat transcript into the backend's single-turn input

use crate::types::{ChatMessage, Role};

/// Input for one backend invocation
///
/// The backend accepts a single text turn, so earlier assistant answers are
/// inlined into the body. Multi-turn structure cannot be recovered from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledPrompt {
    /// System instructions joined by blank lines, passed as `--system-prompt`
    pub system_text: String,
    /// Conversation text, written to the backend's stdin
    pub body_text: String,
}

impl AssembledPrompt {
    /// Assemble a prompt from messages in conversation order
    pub fn assemble(messages: &[ChatMessage]) -> Self {
        let mut system_parts = Vec::new();
        let mut body_text = String::new();

        for message in messages {
            match message.role {
                Role::System => system_parts.push(message.content.as_str()),
                Role::User => {
                    body_text.push_str(&message.content);
                    body_text.push('\n');
                }
                Role::Assistant => {
                    body_text.push_str("[Previous response: ");
                    body_text.push_str(&message.content);
                    body_text.push_str("]\n");
                }
            }
        }

        Self {
            system_text: system_parts.join("\n\n"),
            body_text,
        }
    }

    /// System prompt to pass to the backend, if any
    pub fn system_prompt(&self) -> Option<&str> {
        Some(self.system_text.as_str()).filter(|text| !text.is_empty())
    }

    /// Character count of everything sent to the backend
    pub fn char_count(&self) -> usize {
        self.system_text.chars().count() + self.body_text.chars().count()
    }
}
