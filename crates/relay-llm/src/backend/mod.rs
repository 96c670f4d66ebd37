//! Backend trait and implementations for running the inference CLI

pub mod cli;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;

use std::io;

use async_trait::async_trait;

pub use self::cli::CliBackend;
use crate::error::LlmError;
use crate::model::CanonicalModel;
use crate::prompt::AssembledPrompt;

/// Output mode requested from the backend CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text answer on stdout
    Text,
    /// One JSON event per stdout line
    StreamJson,
}

/// Everything needed to run the backend once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub model: CanonicalModel,
    pub prompt: AssembledPrompt,
    pub format: OutputFormat,
}

impl Invocation {
    pub const fn new(model: CanonicalModel, prompt: AssembledPrompt, format: OutputFormat) -> Self {
        Self { model, prompt, format }
    }

    /// Command-line arguments for this invocation
    ///
    /// The system prompt is only passed when non-empty; the body is written
    /// to stdin and never appears here.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["--print".to_owned(), "--model".to_owned(), self.model.to_string()];

        if self.format == OutputFormat::StreamJson {
            args.extend(["--output-format", "stream-json", "--verbose"].map(str::to_owned));
        }

        if let Some(system) = self.prompt.system_prompt() {
            args.push("--system-prompt".to_owned());
            args.push(system.to_owned());
        }

        args
    }

    /// Bytes written to the backend's stdin
    pub fn stdin(&self) -> &str {
        &self.prompt.body_text
    }
}

/// How a backend process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub success: bool,
    /// Human-readable exit status, e.g. `exit status: 1`
    pub status: String,
    /// Captured standard error, for operator logs only
    pub stderr: String,
}

/// Result of running the backend to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOutput {
    pub stdout: String,
    pub exit: ProcessExit,
}

/// Runs the inference CLI
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run to completion, capturing all output
    ///
    /// A process that starts but exits unsuccessfully is still `Ok`; callers
    /// inspect [`ProcessExit::success`].
    async fn run(&self, invocation: &Invocation) -> Result<BackendOutput, LlmError>;

    /// Start a long-lived process whose stdout is read line by line
    async fn spawn(&self, invocation: &Invocation) -> Result<Box<dyn BackendProcess>, LlmError>;
}

/// A running backend process
#[async_trait]
pub trait BackendProcess: Send {
    /// Next stdout line without its terminator; `None` once stdout closes
    async fn next_line(&mut self) -> io::Result<Option<String>>;

    /// Wait for the process to exit and collect its status
    async fn finish(self: Box<Self>) -> io::Result<ProcessExit>;

    /// Kill the process and reap it
    async fn kill(self: Box<Self>);
}
