mod auth;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use relay_config::Config;
use relay_llm::{Backend, LlmState};
use tower_http::trace::TraceLayer;

use crate::auth::BearerToken;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration, running the configured CLI
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Self::build(config, LlmState::from_config(&config.backend))
    }

    /// Build the server around an arbitrary backend
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured
    pub fn with_backend(config: &Config, backend: Arc<dyn Backend>) -> anyhow::Result<Self> {
        Self::build(config, LlmState::with_backend(&config.backend, backend))
    }

    fn build(config: &Config, llm_state: LlmState) -> anyhow::Result<Self> {
        let api_key = config
            .server
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("PROXY_API_KEY environment variable required"))?;
        let expected = BearerToken::new(api_key);

        // Authenticated routes; auth runs before method matching
        let llm = relay_llm::llm_router(llm_state).layer(axum::middleware::from_fn(move |req, next| {
            let expected = expected.clone();
            async move { auth::auth_middleware(expected, req, next).await }
        }));

        let router = Router::new()
            .route("/health", axum::routing::get(health))
            .merge(llm)
            .layer(TraceLayer::new_for_http());

        Ok(Self {
            router,
            listen_address: config.server.listen_address(),
        })
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

/// Liveness probe, reachable without credentials
#[allow(clippy::unused_async)]
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use http::{Request, StatusCode};
    use relay_config::ServerConfig;
    use relay_llm::ScriptedBackend;
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::*;

    fn config() -> Config {
        Config {
            server: ServerConfig {
                listen_address: None,
                api_key: Some(SecretString::from("test-key")),
            },
            ..Config::default()
        }
    }

    fn router(backend: &ScriptedBackend) -> Router {
        Server::with_backend(&config(), Arc::new(backend.clone()))
            .unwrap()
            .into_router()
    }

    async fn error_message(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["type"], "error");
        body["error"]["message"].as_str().unwrap().to_owned()
    }

    #[test]
    fn missing_api_key_is_rejected() {
        assert!(Server::new(&Config::default()).is_err());
    }

    #[test]
    fn default_listen_address() {
        let server = Server::new(&config()).unwrap();
        assert_eq!(server.listen_address(), SocketAddr::from(([0, 0, 0, 0], 8080)));
    }

    #[tokio::test]
    async fn health_needs_no_auth() {
        let backend = ScriptedBackend::succeeding("unused");
        let request = Request::get("/health").body(Body::empty()).unwrap();

        let response = router(&backend).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn wrong_key_never_reaches_backend() {
        let backend = ScriptedBackend::succeeding("unused");
        let request = Request::post("/v1/chat/completions")
            .header("authorization", "Bearer nope")
            .body(Body::from(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
            .unwrap();

        let response = router(&backend).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(response).await, "Invalid API key");
        assert!(backend.invocations().is_empty());
    }

    #[tokio::test]
    async fn auth_is_checked_before_method() {
        let backend = ScriptedBackend::succeeding("unused");

        let unauthenticated = Request::get("/v1/chat/completions").body(Body::empty()).unwrap();
        let response = router(&backend).oneshot(unauthenticated).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let authenticated = Request::get("/v1/chat/completions")
            .header("authorization", "Bearer test-key")
            .body(Body::empty())
            .unwrap();
        let response = router(&backend).oneshot(authenticated).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(error_message(response).await, "Method not allowed");
    }

    #[tokio::test]
    async fn models_require_auth() {
        let backend = ScriptedBackend::succeeding("unused");
        let request = Request::get("/v1/models").body(Body::empty()).unwrap();

        let response = router(&backend).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
