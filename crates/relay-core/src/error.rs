use http::StatusCode;

/// Value of the `type` field in every error envelope Relay returns
pub const ERROR_TYPE: &str = "error";

/// Domain errors that know how to present themselves over HTTP
///
/// Handlers render these into the `{"error": {"message", "type"}}`
/// envelope with [`ERROR_TYPE`] as the type.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;
}
