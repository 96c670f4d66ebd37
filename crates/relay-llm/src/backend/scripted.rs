//! In-memory backend replaying canned output

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::{Backend, BackendOutput, BackendProcess, Invocation, ProcessExit};
use crate::error::LlmError;

#[derive(Debug, Clone)]
enum Script {
    Exits { stdout: String, exit: ProcessExit },
    Unavailable(String),
}

#[derive(Debug, Default)]
struct Counters {
    kills: AtomicUsize,
    reaps: AtomicUsize,
}

/// Fake backend that records invocations and replays a fixed script
///
/// In streaming mode the scripted stdout is split into lines. With
/// [`ScriptedBackend::hold_open`] the process never closes stdout after the
/// last line, like a CLI that hangs until killed. With
/// [`ScriptedBackend::break_stdout`] reading past the last line fails.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    script: Script,
    hold_open: bool,
    broken_stdout: bool,
    invocations: Arc<Mutex<Vec<Invocation>>>,
    counters: Arc<Counters>,
}

impl ScriptedBackend {
    fn new(script: Script) -> Self {
        Self {
            script,
            hold_open: false,
            broken_stdout: false,
            invocations: Arc::default(),
            counters: Arc::default(),
        }
    }

    /// Exits successfully after printing `stdout`
    pub fn succeeding(stdout: impl Into<String>) -> Self {
        Self::new(Script::Exits {
            stdout: stdout.into(),
            exit: ProcessExit {
                success: true,
                status: "exit status: 0".to_owned(),
                stderr: String::new(),
            },
        })
    }

    /// Prints stream-json lines, then exits successfully
    pub fn streaming<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stdout = lines.into_iter().fold(String::new(), |mut out, line| {
            out.push_str(line.as_ref());
            out.push('\n');
            out
        });
        Self::succeeding(stdout)
    }

    /// Exits with `code`, writing `stderr`
    pub fn failing(code: i32, stderr: impl Into<String>) -> Self {
        Self::new(Script::Exits {
            stdout: String::new(),
            exit: ProcessExit {
                success: false,
                status: format!("exit status: {code}"),
                stderr: stderr.into(),
            },
        })
    }

    /// Cannot be started at all
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::new(Script::Unavailable(reason.into()))
    }

    /// Keep stdout open after the scripted lines until killed
    #[must_use]
    pub const fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Fail the read after the scripted lines, keeping the process alive
    #[must_use]
    pub const fn break_stdout(mut self) -> Self {
        self.broken_stdout = true;
        self
    }

    /// Invocations received so far, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of spawned processes that were killed
    pub fn kills(&self) -> usize {
        self.counters.kills.load(Ordering::SeqCst)
    }

    /// Number of spawned processes that were waited on to exit
    pub fn reaps(&self) -> usize {
        self.counters.reaps.load(Ordering::SeqCst)
    }

    fn record(&self, invocation: &Invocation) {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation.clone());
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn run(&self, invocation: &Invocation) -> Result<BackendOutput, LlmError> {
        self.record(invocation);

        match &self.script {
            Script::Exits { stdout, exit } => Ok(BackendOutput {
                stdout: stdout.clone(),
                exit: exit.clone(),
            }),
            Script::Unavailable(reason) => Err(LlmError::Backend(reason.clone())),
        }
    }

    async fn spawn(&self, invocation: &Invocation) -> Result<Box<dyn BackendProcess>, LlmError> {
        self.record(invocation);

        match &self.script {
            Script::Exits { stdout, exit } => Ok(Box::new(ScriptedProcess {
                lines: stdout.lines().map(str::to_owned).collect(),
                hold_open: self.hold_open,
                broken_stdout: self.broken_stdout,
                exit: exit.clone(),
                counters: Arc::clone(&self.counters),
            })),
            Script::Unavailable(reason) => Err(LlmError::Backend(reason.clone())),
        }
    }
}

struct ScriptedProcess {
    lines: VecDeque<String>,
    hold_open: bool,
    broken_stdout: bool,
    exit: ProcessExit,
    counters: Arc<Counters>,
}

#[async_trait]
impl BackendProcess for ScriptedProcess {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            None if self.broken_stdout => Err(io::Error::other("stdout pipe broke")),
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }

    async fn finish(self: Box<Self>) -> io::Result<ProcessExit> {
        self.counters.reaps.fetch_add(1, Ordering::SeqCst);
        Ok(self.exit)
    }

    async fn kill(self: Box<Self>) {
        self.counters.kills.fetch_add(1, Ordering::SeqCst);
        self.counters.reaps.fetch_add(1, Ordering::SeqCst);
    }
}
