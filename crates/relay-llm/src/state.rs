//! Shared state for the completion handlers

use std::sync::Arc;

use relay_config::BackendConfig;
use relay_telemetry::BackendMetrics;
use tokio::sync::mpsc;

use crate::backend::{Backend, CliBackend, Invocation, OutputFormat};
use crate::completion;
use crate::error::LlmError;
use crate::model::ModelNormalizer;
use crate::prompt::AssembledPrompt;
use crate::protocol::openai::OpenAiResponse;
use crate::streaming::{self, Frame};
use crate::types::ChatRequest;

/// Shared state for LLM route handlers
///
/// Built once at startup and never mutated.
#[derive(Clone)]
pub struct LlmState {
    inner: Arc<LlmStateInner>,
}

struct LlmStateInner {
    normalizer: ModelNormalizer,
    backend: Arc<dyn Backend>,
    metrics: BackendMetrics,
}

impl LlmState {
    /// State running the configured CLI executable
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::with_backend(config, Arc::new(CliBackend::from_config(config)))
    }

    /// State running an arbitrary backend, with the config's default model
    pub fn with_backend(config: &BackendConfig, backend: Arc<dyn Backend>) -> Self {
        let normalizer = ModelNormalizer::new(&config.default_model);
        tracing::debug!(default_model = %normalizer.default_model(), "backend state ready");

        Self {
            inner: Arc::new(LlmStateInner {
                normalizer,
                backend,
                metrics: BackendMetrics::new(),
            }),
        }
    }

    pub fn normalizer(&self) -> &ModelNormalizer {
        &self.inner.normalizer
    }

    fn invocation(&self, request: &ChatRequest, format: OutputFormat) -> Invocation {
        Invocation::new(
            self.inner.normalizer.normalize(&request.model),
            AssembledPrompt::assemble(&request.messages),
            format,
        )
    }

    /// Run a non-streaming completion
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Backend`] if the backend cannot be started or fails
    pub async fn complete(&self, request: &ChatRequest) -> Result<OpenAiResponse, LlmError> {
        let Invocation { model, prompt, .. } = self.invocation(request, OutputFormat::Text);
        completion::complete(self.inner.backend.as_ref(), &self.inner.metrics, model, prompt).await
    }

    /// Start a streaming completion, returning the frames as they are produced
    pub fn stream(&self, request: &ChatRequest) -> mpsc::Receiver<Frame> {
        streaming::start(
            Arc::clone(&self.inner.backend),
            self.invocation(request, OutputFormat::StreamJson),
            self.inner.metrics.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::scripted::ScriptedBackend;
    use crate::model::CanonicalModel;
    use crate::types::ChatMessage;

    fn state(backend: &ScriptedBackend, default_model: &str) -> LlmState {
        let config = BackendConfig {
            default_model: default_model.to_owned(),
            ..BackendConfig::default()
        };
        LlmState::with_backend(&config, Arc::new(backend.clone()))
    }

    #[tokio::test]
    async fn complete_echoes_invoked_model() {
        let backend = ScriptedBackend::succeeding("Hi");
        let request = ChatRequest {
            model: "Claude-Opus-4-1".to_owned(),
            messages: vec![ChatMessage::user("Hello")],
            stream: false,
        };

        let response = state(&backend, "sonnet").complete(&request).await.unwrap();

        assert_eq!(response.model, "opus");
        assert_eq!(backend.invocations()[0].model, CanonicalModel::Opus);
    }

    #[tokio::test]
    async fn empty_model_uses_configured_default() {
        let backend = ScriptedBackend::succeeding("Hi");
        let request = ChatRequest {
            messages: vec![ChatMessage::user("Hello")],
            ..ChatRequest::default()
        };

        let response = state(&backend, "claude-haiku-4-5").complete(&request).await.unwrap();

        assert_eq!(response.model, "haiku");
        assert_eq!(backend.invocations()[0].args(), ["--print", "--model", "haiku"]);
    }

    #[tokio::test]
    async fn stream_uses_stream_json_format() {
        let backend = ScriptedBackend::streaming(Vec::<String>::new());
        let mut rx = state(&backend, "sonnet").stream(&ChatRequest::default());

        while rx.recv().await.is_some() {}

        let invocations = backend.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].format, OutputFormat::StreamJson);
        assert_eq!(invocations[0].model, CanonicalModel::Sonnet);
    }
}
