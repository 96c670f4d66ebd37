//! Metric names and the instruments recorded around backend invocations

use std::time::Instant;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};

pub const BACKEND_INVOCATION_COUNT: &str = "relay.backend.invocation.count";
pub const BACKEND_INVOCATION_DURATION: &str = "relay.backend.invocation.duration";
pub const STREAM_TIME_TO_FIRST_CHUNK: &str = "relay.stream.time_to_first_chunk";

/// Record a duration measurement on a histogram
pub fn record_duration(histogram: &Histogram<f64>, start: Instant, attributes: &[KeyValue]) {
    histogram.record(start.elapsed().as_secs_f64(), attributes);
}

/// How an invocation was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    Complete,
    Stream,
}

impl InvocationMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Stream => "stream",
        }
    }
}

/// How an invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Success,
    /// The process could not be started
    SpawnFailed,
    /// The process exited with a failure status
    Failed,
    /// The client went away mid-stream
    Disconnected,
}

impl InvocationOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::SpawnFailed => "spawn_failed",
            Self::Failed => "failed",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Instruments for backend CLI invocations
///
/// Built from the global meter provider, so recording is a no-op until
/// telemetry export is configured.
#[derive(Clone)]
pub struct BackendMetrics {
    invocations: Counter<u64>,
    duration: Histogram<f64>,
    first_chunk: Histogram<f64>,
}

impl BackendMetrics {
    pub fn new() -> Self {
        let meter = global::meter("relay");

        Self {
            invocations: meter
                .u64_counter(BACKEND_INVOCATION_COUNT)
                .with_description("Backend CLI invocations")
                .build(),
            duration: meter
                .f64_histogram(BACKEND_INVOCATION_DURATION)
                .with_description("Wall time of a backend CLI invocation")
                .with_unit("s")
                .build(),
            first_chunk: meter
                .f64_histogram(STREAM_TIME_TO_FIRST_CHUNK)
                .with_description("Time from spawn to the first content chunk")
                .with_unit("s")
                .build(),
        }
    }

    /// Count a finished invocation and record how long it took
    pub fn record_invocation(&self, mode: InvocationMode, model: &str, outcome: InvocationOutcome, start: Instant) {
        let attributes = [
            KeyValue::new("mode", mode.as_str()),
            KeyValue::new("model", model.to_owned()),
            KeyValue::new("outcome", outcome.as_str()),
        ];

        self.invocations.add(1, &attributes);
        record_duration(&self.duration, start, &attributes);
    }

    /// Record the latency until the first content chunk of a stream
    pub fn record_first_chunk(&self, model: &str, start: Instant) {
        record_duration(&self.first_chunk, start, &[KeyValue::new("model", model.to_owned())]);
    }
}

impl Default for BackendMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_exporter_is_a_noop() {
        let metrics = BackendMetrics::new();
        let start = Instant::now();

        metrics.record_first_chunk("sonnet", start);
        metrics.record_invocation(InvocationMode::Stream, "sonnet", InvocationOutcome::Success, start);
        metrics.record_invocation(InvocationMode::Complete, "opus", InvocationOutcome::SpawnFailed, start);
    }

    #[test]
    fn attribute_values() {
        assert_eq!(InvocationMode::Complete.as_str(), "complete");
        assert_eq!(InvocationOutcome::Disconnected.as_str(), "disconnected");
    }
}
