//! Events written by the backend CLI in `--output-format stream-json` mode
//!
//! Each stdout line is one JSON object discriminated by `type`. Only two
//! kinds matter to Relay: `assistant` messages carrying text fragments and
//! the closing `result`. Everything else (`system`, `user`, tool traffic)
//! parses as [`CliEvent::Other`] and is ignored.

use serde::Deserialize;

/// One line of the backend's event stream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CliEvent {
    /// Incremental assistant output
    Assistant {
        /// Message payload holding the content blocks
        message: CliMessage,
    },
    /// Final outcome of the run
    Result {
        /// Complete answer text, absent on some error results
        #[serde(default)]
        result: Option<String>,
    },
    /// Any other event type
    #[serde(other)]
    Other,
}

/// Assistant message payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CliMessage {
    #[serde(default)]
    pub content: Vec<CliContentBlock>,
}

/// Content block within an assistant message
///
/// Text blocks carry `text`; tool-use blocks do not and are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CliContentBlock {
    #[serde(default)]
    pub text: Option<String>,
}

impl CliEvent {
    /// Parse one stdout line, returning `None` for blank or malformed lines
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match serde_json::from_str(line) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::trace!(error = %e, "skipping unparseable backend line");
                None
            }
        }
    }

    /// Non-empty text fragments of an assistant event, in order
    pub fn text_fragments(&self) -> impl Iterator<Item = &str> {
        let blocks: &[CliContentBlock] = match self {
            Self::Assistant { message } => message.content.as_slice(),
            Self::Result { .. } | Self::Other => &[],
        };

        blocks
            .iter()
            .filter_map(|block| block.text.as_deref())
            .filter(|text| !text.is_empty())
    }
}
