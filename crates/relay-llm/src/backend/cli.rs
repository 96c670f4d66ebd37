//! Backend that runs the inference CLI as a child process

use std::io;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use relay_config::BackendConfig;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::{Backend, BackendOutput, BackendProcess, Invocation, ProcessExit};
use crate::error::LlmError;

/// Longest stdout line accepted from a streaming process
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Runs a configurable executable with per-invocation arguments
#[derive(Debug, Clone)]
pub struct CliBackend {
    command: String,
    base_args: Vec<String>,
}

impl CliBackend {
    /// `base_args` are placed before the per-invocation arguments
    pub fn new(command: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            base_args,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut command = Command::new(&self.command);
        command
            .args(&self.base_args)
            .args(invocation.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn start(&self, invocation: &Invocation) -> Result<Child, LlmError> {
        let mut child = self.command(invocation).spawn().map_err(|e| {
            tracing::error!(command = %self.command, error = %e, "failed to start backend CLI");
            LlmError::Backend(e.to_string())
        })?;

        if let Some(stdin) = child.stdin.take() {
            feed_stdin(stdin, invocation.stdin().to_owned());
        }

        Ok(child)
    }
}

/// Write the prompt on a separate task so a chatty child cannot deadlock us
fn feed_stdin(mut stdin: ChildStdin, input: String) {
    tokio::spawn(async move {
        if let Err(e) = stdin.write_all(input.as_bytes()).await {
            tracing::debug!(error = %e, "backend CLI closed stdin early");
        }
    });
}

fn drain_stderr(stderr: Option<ChildStderr>) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut captured = String::new();
        if let Some(mut stderr) = stderr
            && let Err(e) = stderr.read_to_string(&mut captured).await
        {
            tracing::debug!(error = %e, "failed to read backend stderr");
        }
        captured
    })
}

fn exit_of(status: ExitStatus, stderr: String) -> ProcessExit {
    ProcessExit {
        success: status.success(),
        status: status.to_string(),
        stderr,
    }
}

#[async_trait]
impl Backend for CliBackend {
    async fn run(&self, invocation: &Invocation) -> Result<BackendOutput, LlmError> {
        let child = self.start(invocation)?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| LlmError::Backend(e.to_string()))?;

        Ok(BackendOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit: exit_of(output.status, String::from_utf8_lossy(&output.stderr).into_owned()),
        })
    }

    async fn spawn(&self, invocation: &Invocation) -> Result<Box<dyn BackendProcess>, LlmError> {
        let mut child = self.start(invocation)?;

        let Some(stdout) = child.stdout.take() else {
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill backend CLI");
            }
            return Err(LlmError::Backend("stdout pipe unavailable".to_owned()));
        };
        let stderr = drain_stderr(child.stderr.take());

        Ok(Box::new(CliProcess {
            child,
            stdout: BufReader::new(stdout),
            stderr,
            buffer: Vec::new(),
        }))
    }
}

/// Child process with a line reader over its stdout
struct CliProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: JoinHandle<String>,
    buffer: Vec<u8>,
}

#[async_trait]
impl BackendProcess for CliProcess {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buffer.clear();
        let limit = MAX_LINE_BYTES as u64 + 1;
        if (&mut self.stdout).take(limit).read_until(b'\n', &mut self.buffer).await? == 0 {
            return Ok(None);
        }

        if self.buffer.len() > MAX_LINE_BYTES && self.buffer.last() != Some(&b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("backend output line exceeds {MAX_LINE_BYTES} bytes"),
            ));
        }

        let line = String::from_utf8_lossy(&self.buffer);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_owned()))
    }

    async fn finish(mut self: Box<Self>) -> io::Result<ProcessExit> {
        let status = self.child.wait().await?;
        let stderr = self.stderr.await.unwrap_or_default();

        Ok(exit_of(status, stderr))
    }

    async fn kill(mut self: Box<Self>) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!(error = %e, "failed to kill backend CLI");
        }
        self.stderr.abort();
    }
}
