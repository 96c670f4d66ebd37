use std::net::SocketAddr;

use secrecy::SecretString;
use serde::Deserialize;

/// Port used when neither the config file nor `PORT` sets one
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind, defaults to all interfaces on [`DEFAULT_PORT`]
    #[serde(default)]
    pub listen_address: Option<SocketAddr>,
    /// Shared secret clients must present as `Authorization: Bearer <key>`
    #[serde(default)]
    pub api_key: Option<SecretString>,
}

impl ServerConfig {
    /// Effective listen address
    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))
    }
}
