//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use relay_config::{BackendConfig, Config, ServerConfig};
use secrecy::SecretString;

/// API key every test server is started with
pub const API_KEY: &str = "test-key";

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    api_key: Some(SecretString::from(API_KEY)),
                },
                backend: BackendConfig::default(),
                telemetry: None,
            },
        }
    }

    /// Model used when requests leave `model` empty
    pub fn with_default_model(mut self, model: &str) -> Self {
        self.config.backend.default_model = model.to_owned();
        self
    }

    /// Run `command` with `args` before the generated arguments
    pub fn with_backend_command(mut self, command: &str, args: Vec<String>) -> Self {
        self.config.backend.command = command.to_owned();
        self.config.backend.args = args;
        self
    }

    /// Run a shell script as the backend CLI
    ///
    /// The generated arguments are available to the script as `"$@"`.
    pub fn with_shell_backend(self, script: &str) -> Self {
        self.with_backend_command("sh", vec!["-c".to_owned(), script.to_owned(), "relay-backend".to_owned()])
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
