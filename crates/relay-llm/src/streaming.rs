//! Streaming completions: translate the backend's event stream into chunks
//!
//! A [`StreamTranslator`] is a pure state machine over stdout lines. The
//! driver task started by [`start`] owns the process, feeds lines through the
//! translator and pushes the resulting [`Frame`]s into a bounded channel that
//! backs the SSE body.

use std::sync::Arc;
use std::time::Instant;

use relay_telemetry::{BackendMetrics, InvocationMode, InvocationOutcome};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::backend::{Backend, BackendProcess, Invocation};
use crate::framer::{self, ChunkFramer};
use crate::protocol::cli::CliEvent;
use crate::protocol::openai::{OpenAiErrorResponse, OpenAiStreamChunk};

/// Frames buffered between the driver and the HTTP body
const FRAME_BUFFER: usize = 32;

/// Client-visible message when the backend cannot be started
pub const SPAWN_FAILURE_MESSAGE: &str = "Failed to start backend CLI";

/// One SSE `data:` payload
#[derive(Debug, Clone)]
pub enum Frame {
    Chunk(OpenAiStreamChunk),
    Error(OpenAiErrorResponse),
    /// The `[DONE]` terminator
    Done,
}

#[cfg(feature = "http")]
impl Frame {
    /// Render as an SSE event
    pub fn into_event(self) -> Result<axum::response::sse::Event, axum::Error> {
        use axum::response::sse::Event;

        match self {
            Self::Chunk(chunk) => Event::default().json_data(chunk),
            Self::Error(error) => Event::default().json_data(error),
            Self::Done => Ok(Event::default().data(framer::DONE_SENTINEL)),
        }
    }
}

/// Frames sent when the backend never started: an error, then `[DONE]`
pub fn spawn_failure_frames() -> [Frame; 2] {
    [Frame::Error(framer::error_body(SPAWN_FAILURE_MESSAGE)), Frame::Done]
}

/// Progress of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Nothing sent yet; the role chunk is still owed
    AwaitingRole,
    Streaming,
    /// Stop chunk and `[DONE]` sent
    Done,
}

/// Turns backend event lines into chunk frames
#[derive(Debug, Clone)]
pub struct StreamTranslator {
    framer: ChunkFramer,
    phase: StreamPhase,
}

impl StreamTranslator {
    pub const fn new(framer: ChunkFramer) -> Self {
        Self {
            framer,
            phase: StreamPhase::AwaitingRole,
        }
    }

    pub const fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Handle one stdout line; blank and unparseable lines yield nothing
    pub fn on_line(&mut self, line: &str) -> Vec<Frame> {
        CliEvent::parse(line)
            .map(|event| self.on_event(&event))
            .unwrap_or_default()
    }

    pub fn on_event(&mut self, event: &CliEvent) -> Vec<Frame> {
        if self.phase == StreamPhase::Done {
            return Vec::new();
        }

        let mut frames = Vec::new();

        match event {
            CliEvent::Assistant { .. } => {
                for text in event.text_fragments() {
                    if self.phase == StreamPhase::AwaitingRole {
                        frames.push(Frame::Chunk(self.framer.role()));
                        self.phase = StreamPhase::Streaming;
                    }
                    frames.push(Frame::Chunk(self.framer.content(text)));
                }
            }
            CliEvent::Result { result: Some(result) }
                if self.phase == StreamPhase::AwaitingRole && !result.is_empty() =>
            {
                frames.push(Frame::Chunk(self.framer.role_with_content(result)));
                self.phase = StreamPhase::Streaming;
            }
            CliEvent::Result { .. } | CliEvent::Other => {}
        }

        frames
    }

    /// Close the stream: stop chunk then `[DONE]`, exactly once
    pub fn finish(&mut self) -> Vec<Frame> {
        if self.phase == StreamPhase::Done {
            return Vec::new();
        }

        self.phase = StreamPhase::Done;
        vec![Frame::Chunk(self.framer.stop()), Frame::Done]
    }
}

/// Start streaming `invocation` on a background task
///
/// The returned receiver yields every frame of the response. Dropping it
/// kills the backend process.
pub fn start(backend: Arc<dyn Backend>, invocation: Invocation, metrics: BackendMetrics) -> mpsc::Receiver<Frame> {
    let (tx, rx) = mpsc::channel(FRAME_BUFFER);
    let translator = StreamTranslator::new(ChunkFramer::new(&invocation.model));
    let span = tracing::info_span!("stream", id = translator.framer.id(), model = %invocation.model);

    tokio::spawn(drive(backend, invocation, translator, tx, metrics).instrument(span));

    rx
}

async fn drive(
    backend: Arc<dyn Backend>,
    invocation: Invocation,
    mut translator: StreamTranslator,
    tx: mpsc::Sender<Frame>,
    metrics: BackendMetrics,
) {
    let model = invocation.model.as_str();

    tracing::info!(prompt_chars = invocation.prompt.char_count(), "processing streaming request");
    let start = Instant::now();

    let mut process = match backend.spawn(&invocation).await {
        Ok(process) => process,
        Err(e) => {
            tracing::error!(error = %e, "failed to start backend CLI for streaming");
            metrics.record_invocation(InvocationMode::Stream, model, InvocationOutcome::SpawnFailed, start);
            send_all(&tx, spawn_failure_frames()).await;
            return;
        }
    };

    let end = pump(&mut *process, &mut translator, &tx, &metrics, model, start).await;

    let outcome = match end {
        PumpEnd::Disconnected => {
            tracing::info!("client disconnected, killing backend CLI");
            process.kill().await;
            metrics.record_invocation(InvocationMode::Stream, model, InvocationOutcome::Disconnected, start);
            return;
        }
        PumpEnd::ReadFailed => {
            // A child blocked on a full stdout pipe would never exit
            process.kill().await;
            if send_all(&tx, translator.finish()).await {
                InvocationOutcome::Failed
            } else {
                InvocationOutcome::Disconnected
            }
        }
        PumpEnd::Eof => {
            let delivered = send_all(&tx, translator.finish()).await;
            drop(tx);

            let outcome = reap(process).await;
            if delivered { outcome } else { InvocationOutcome::Disconnected }
        }
    };

    metrics.record_invocation(InvocationMode::Stream, model, outcome, start);
    tracing::info!(elapsed_ms = start.elapsed().as_millis(), "streaming response completed");
}

/// Wait for a process whose stdout reached EOF
async fn reap(process: Box<dyn BackendProcess>) -> InvocationOutcome {
    match process.finish().await {
        Ok(exit) if exit.success => InvocationOutcome::Success,
        Ok(exit) => {
            tracing::warn!(status = %exit.status, stderr = %exit.stderr.trim(), "backend CLI exited unsuccessfully");
            InvocationOutcome::Failed
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to wait for backend CLI");
            InvocationOutcome::Failed
        }
    }
}

/// Why [`pump`] stopped forwarding lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpEnd {
    /// Stdout closed
    Eof,
    /// Stdout could not be read; the process is still running
    ReadFailed,
    /// The client went away
    Disconnected,
}

/// Forward stdout lines until it closes, fails, or the client leaves
async fn pump(
    process: &mut dyn BackendProcess,
    translator: &mut StreamTranslator,
    tx: &mpsc::Sender<Frame>,
    metrics: &BackendMetrics,
    model: &str,
    start: Instant,
) -> PumpEnd {
    loop {
        let line = tokio::select! {
            biased;
            () = tx.closed() => return PumpEnd::Disconnected,
            line = process.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return PumpEnd::Eof,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read backend output, killing backend CLI");
                return PumpEnd::ReadFailed;
            }
        };

        let awaiting = translator.phase() == StreamPhase::AwaitingRole;
        let frames = translator.on_line(&line);
        if awaiting && translator.phase() == StreamPhase::Streaming {
            metrics.record_first_chunk(model, start);
        }

        if !send_all(tx, frames).await {
            return PumpEnd::Disconnected;
        }
    }
}

/// Send frames in order; `false` once the receiver is gone
async fn send_all(tx: &mpsc::Sender<Frame>, frames: impl IntoIterator<Item = Frame>) -> bool {
    for frame in frames {
        if tx.send(frame).await.is_err() {
            return false;
        }
    }
    true
}
