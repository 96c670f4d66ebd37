#![allow(clippy::must_use_candidate)]

pub mod backend;
mod env;
mod loader;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use backend::*;
pub use server::*;
pub use telemetry::{ExportProtocol, ExporterConfig, LogFormat, TelemetryConfig};

/// Top-level Relay configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Backend CLI configuration
    #[serde(default)]
    pub backend: BackendConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
