use http::StatusCode;
use relay_core::HttpError;
use thiserror::Error;

/// Errors surfaced to clients of the completion endpoints
#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing or wrong bearer token
    #[error("Invalid API key")]
    Unauthorized,

    /// Endpoint called with an unsupported HTTP method
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Body could not be read or is not a valid request
    #[error("{0}")]
    InvalidRequest(String),

    /// The backend CLI could not be started or exited unsuccessfully
    #[error("Backend CLI failed: {0}")]
    Backend(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Backend(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(LlmError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(LlmError::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            LlmError::InvalidRequest("Invalid JSON".to_owned()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LlmError::Backend("exit status: 1".to_owned()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn backend_message_carries_reason() {
        let error = LlmError::Backend("exit status: 2".to_owned());
        assert_eq!(error.client_message(), "Backend CLI failed: exit status: 2");
    }

    #[test]
    fn internal_details_are_hidden() {
        let error = LlmError::Internal(anyhow::anyhow!("pipe closed at fd 7"));
        assert_eq!(error.client_message(), "an internal error occurred");
    }
}
