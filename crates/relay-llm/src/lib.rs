//! Core translation crate for Relay
//!
//! Turns OpenAI-style chat completion requests into invocations of an
//! external inference CLI and turns the CLI's output (plain text or a
//! line-delimited JSON event stream) back into OpenAI-shaped completions and
//! SSE chunks.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod backend;
pub mod completion;
pub mod convert;
pub mod error;
pub mod framer;
#[cfg(feature = "http")]
pub mod handler;
pub mod model;
pub mod prompt;
pub mod protocol;
pub mod state;
pub mod streaming;
pub mod types;

pub use backend::{Backend, BackendOutput, BackendProcess, CliBackend, Invocation, OutputFormat, ProcessExit};
#[cfg(any(test, feature = "testing"))]
pub use backend::scripted::ScriptedBackend;
pub use error::LlmError;
#[cfg(feature = "http")]
pub use handler::{error_response, llm_router};
pub use model::{CanonicalModel, ModelNormalizer};
pub use prompt::AssembledPrompt;
pub use state::LlmState;
pub use streaming::{Frame, StreamPhase, StreamTranslator};
pub use types::{ChatMessage, ChatRequest, Role};
