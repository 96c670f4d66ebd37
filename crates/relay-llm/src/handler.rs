//! Axum route handlers for the OpenAI-compatible endpoints

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::extract::rejection::BytesRejection;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::StreamExt;
use http::HeaderValue;
use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONNECTION};
use relay_core::HttpError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::LlmError;
use crate::framer;
use crate::model::CanonicalModel;
use crate::protocol::openai::{OpenAiModel, OpenAiModelList, OpenAiRequest};
use crate::state::LlmState;
use crate::streaming::Frame;
use crate::types::ChatRequest;

/// Build the LLM router with all endpoints
///
/// Any method other than the routed one answers `405` with the error
/// envelope. Request bodies are not size-limited.
pub fn llm_router(state: LlmState) -> Router {
    Router::new()
        .route(
            "/v1/chat/completions",
            routing::post(chat_completions).fallback(method_not_allowed),
        )
        .route("/v1/models", routing::get(list_models).fallback(method_not_allowed))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// Render an error as `{"error":{"message","type":"error"}}` with its status
pub fn error_response<E: HttpError>(error: &E) -> Response {
    (error.status_code(), Json(framer::error_body(error.client_message()))).into_response()
}

/// Handle `POST /v1/chat/completions`
async fn chat_completions(State(state): State<LlmState>, body: Result<Bytes, BytesRejection>) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "failed to read request body");
            return error_response(&LlmError::InvalidRequest("Failed to read request".to_owned()));
        }
    };

    let wire_request: OpenAiRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "rejecting malformed request body");
            return error_response(&LlmError::InvalidRequest("Invalid JSON".to_owned()));
        }
    };
    let request: ChatRequest = wire_request.into();

    if request.stream {
        stream_response(state.stream(&request))
    } else {
        match state.complete(&request).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => error_response(&e),
        }
    }
}

/// Handle `GET /v1/models`
#[allow(clippy::unused_async)]
async fn list_models() -> Response {
    let created = framer::unix_timestamp();

    let data = CanonicalModel::KNOWN
        .iter()
        .map(|model| OpenAiModel {
            id: model.to_string(),
            object: "model".to_owned(),
            created,
            owned_by: "relay".to_owned(),
        })
        .collect();

    Json(OpenAiModelList {
        object: "list".to_owned(),
        data,
    })
    .into_response()
}

#[allow(clippy::unused_async)]
async fn method_not_allowed() -> Response {
    error_response(&LlmError::MethodNotAllowed)
}

/// Build the SSE response for a stream of frames
fn stream_response(frames: mpsc::Receiver<Frame>) -> Response {
    let events = ReceiverStream::new(frames).map(Frame::into_event);

    let mut response = Sse::new(events).keep_alive(KeepAlive::default()).into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

    response
}
