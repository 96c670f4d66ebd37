use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use relay_llm::{LlmError, error_response};
use secrecy::{ExposeSecret, SecretString};

/// Expected `Authorization` header value
#[derive(Clone)]
pub struct BearerToken(Arc<SecretString>);

impl BearerToken {
    pub fn new(api_key: &SecretString) -> Self {
        Self(Arc::new(SecretString::from(format!("Bearer {}", api_key.expose_secret()))))
    }

    fn matches(&self, header: Option<&str>) -> bool {
        header.is_some_and(|value| value == self.0.expose_secret())
    }
}

/// Reject requests whose `Authorization` header is not exactly `Bearer <key>`
pub async fn auth_middleware(expected: BearerToken, request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if !expected.matches(header) {
        tracing::warn!(
            path = %request.uri().path(),
            has_header = header.is_some(),
            "rejecting request with invalid API key"
        );
        return error_response(&LlmError::Unauthorized);
    }

    next.run(request).await
}
