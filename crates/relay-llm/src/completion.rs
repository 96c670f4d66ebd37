//! Non-streaming completions: run the backend once and wrap its answer

use std::time::Instant;

use relay_telemetry::{BackendMetrics, InvocationMode, InvocationOutcome};

use crate::backend::{Backend, Invocation, OutputFormat};
use crate::error::LlmError;
use crate::framer;
use crate::model::CanonicalModel;
use crate::prompt::AssembledPrompt;
use crate::protocol::openai::OpenAiResponse;

/// Run the backend to completion and frame its stdout as one choice
///
/// # Errors
///
/// Returns [`LlmError::Backend`] if the process cannot be started or exits
/// unsuccessfully. Its stderr is logged and never returned.
pub async fn complete(
    backend: &dyn Backend,
    metrics: &BackendMetrics,
    model: CanonicalModel,
    prompt: AssembledPrompt,
) -> Result<OpenAiResponse, LlmError> {
    let invocation = Invocation::new(model, prompt, OutputFormat::Text);
    let model_name = invocation.model.as_str();

    tracing::info!(
        model = model_name,
        prompt_chars = invocation.prompt.char_count(),
        "processing request"
    );
    let start = Instant::now();

    let output = match backend.run(&invocation).await {
        Ok(output) => output,
        Err(e) => {
            metrics.record_invocation(InvocationMode::Complete, model_name, InvocationOutcome::SpawnFailed, start);
            return Err(e);
        }
    };

    if !output.exit.success {
        tracing::warn!(
            model = model_name,
            status = %output.exit.status,
            stderr = %output.exit.stderr.trim(),
            "backend CLI exited unsuccessfully"
        );
        metrics.record_invocation(InvocationMode::Complete, model_name, InvocationOutcome::Failed, start);
        return Err(LlmError::Backend(output.exit.status));
    }

    let content = output.stdout.trim().to_owned();
    metrics.record_invocation(InvocationMode::Complete, model_name, InvocationOutcome::Success, start);
    tracing::info!(
        model = model_name,
        elapsed_ms = start.elapsed().as_millis(),
        output_chars = content.chars().count(),
        "response received"
    );

    let usage = framer::estimate_usage(&invocation.prompt, &content);
    Ok(framer::completion(&invocation.model, content, usage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::scripted::ScriptedBackend;
    use crate::types::ChatMessage;

    fn prompt() -> AssembledPrompt {
        AssembledPrompt::assemble(&[ChatMessage::system("Be terse."), ChatMessage::user("Say hi")])
    }

    #[tokio::test]
    async fn wraps_trimmed_output() {
        let backend = ScriptedBackend::succeeding("  Hello there!\n\n");
        let response = complete(&backend, &BackendMetrics::new(), CanonicalModel::Haiku, prompt())
            .await
            .unwrap();

        assert_eq!(response.object, "chat.completion");
        assert_eq!(response.model, "haiku");
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.choices[0].message.content, "Hello there!");
        assert_eq!(response.choices[0].message.role, "assistant");
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));

        let usage = response.usage.unwrap();
        // "Be terse." + "Say hi\n" is 16 characters; "Hello there!" is 12
        assert_eq!(usage.prompt_tokens, 4);
        assert_eq!(usage.completion_tokens, 3);
        assert_eq!(usage.total_tokens, 7);
    }

    #[tokio::test]
    async fn invokes_backend_with_text_format() {
        let backend = ScriptedBackend::succeeding("ok");
        complete(&backend, &BackendMetrics::new(), CanonicalModel::Opus, prompt())
            .await
            .unwrap();

        let invocations = backend.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].format, OutputFormat::Text);
        assert_eq!(invocations[0].model, CanonicalModel::Opus);
        assert_eq!(invocations[0].stdin(), "Say hi\n");
    }

    #[tokio::test]
    async fn failed_exit_hides_stderr() {
        let backend = ScriptedBackend::failing(1, "secret token expired");
        let error = complete(&backend, &BackendMetrics::new(), CanonicalModel::Sonnet, prompt())
            .await
            .unwrap_err();

        let LlmError::Backend(reason) = &error else {
            panic!("unexpected error: {error:?}");
        };
        assert_eq!(reason, "exit status: 1");
        assert!(!error.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn launch_failure_is_backend_error() {
        let backend = ScriptedBackend::unavailable("No such file or directory (os error 2)");
        let error = complete(&backend, &BackendMetrics::new(), CanonicalModel::Sonnet, prompt())
            .await
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "Backend CLI failed: No such file or directory (os error 2)"
        );
    }
}
