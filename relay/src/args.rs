use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use relay_config::Config;
use secrecy::SecretString;

/// Relay
#[derive(Debug, Parser)]
#[command(name = "relay", about = "OpenAI-compatible API proxy for a command-line inference tool")]
pub struct Args {
    /// Path to an optional configuration file
    #[arg(short, long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Shared secret clients send as `Authorization: Bearer <key>`
    #[arg(long, env = "PROXY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Port to listen on; an empty value keeps the default
    #[arg(long, env = "PORT")]
    pub port: Option<String>,

    /// Model used when a request does not name one
    #[arg(long, env = "CLAUDE_MODEL")]
    pub model: Option<String>,

    /// Backend CLI executable
    #[arg(long, env = "RELAY_BACKEND_COMMAND")]
    pub backend_command: Option<String>,

    /// Log filter directives
    #[arg(long, env = "RELAY_LOG", default_value = "info")]
    pub log_filter: String,
}

impl Args {
    /// Load the config file, if any, and apply command-line overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or the result is invalid
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match self.config {
            Some(ref path) => Config::load(path)?,
            None => Config::default(),
        };

        self.apply(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(ref key) = self.api_key {
            config.server.api_key = Some(SecretString::from(key.clone()));
        }

        if let Some(port) = self.port.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            let port: u16 = port
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid port '{port}': {e}"))?;
            let ip = config.server.listen_address().ip();
            config.server.listen_address = Some(SocketAddr::new(ip, port));
        }

        if let Some(ref model) = self.model
            && !model.trim().is_empty()
        {
            config.backend.default_model.clone_from(model);
        }

        if let Some(ref command) = self.backend_command {
            config.backend.command.clone_from(command);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const VARS: [&str; 6] = [
        "RELAY_CONFIG",
        "PROXY_API_KEY",
        "PORT",
        "CLAUDE_MODEL",
        "RELAY_BACKEND_COMMAND",
        "RELAY_LOG",
    ];

    fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let mut all: Vec<(&str, Option<&str>)> = VARS.iter().map(|name| (*name, None)).collect();
        for (name, value) in vars {
            if let Some(slot) = all.iter_mut().find(|(n, _)| n == name) {
                slot.1 = Some(*value);
            }
        }
        temp_env::with_vars(all, f)
    }

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("relay").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_from_environment() {
        let config = with_env(&[("PROXY_API_KEY", "secret")], || parse(&[]).load_config()).unwrap();

        assert_eq!(config.server.listen_address().port(), 8080);
        assert_eq!(config.backend.default_model, "sonnet");
        assert_eq!(config.backend.command, "claude");
    }

    #[test]
    fn missing_api_key_fails() {
        let error = with_env(&[], || parse(&[]).load_config()).unwrap_err();
        assert!(error.to_string().contains("PROXY_API_KEY"));
    }

    #[test]
    fn environment_overrides() {
        let (args, config) = with_env(
            &[
                ("PROXY_API_KEY", "secret"),
                ("PORT", "9191"),
                ("CLAUDE_MODEL", "opus"),
                ("RELAY_BACKEND_COMMAND", "/opt/bin/claude"),
                ("RELAY_LOG", "debug"),
            ],
            || {
                let args = parse(&[]);
                let config = args.load_config();
                (args, config)
            },
        );
        let config = config.unwrap();

        assert_eq!(config.server.listen_address().port(), 9191);
        assert_eq!(config.backend.default_model, "opus");
        assert_eq!(config.backend.command, "/opt/bin/claude");
        assert_eq!(args.log_filter, "debug");
    }

    #[test]
    fn empty_port_keeps_default() {
        let config = with_env(&[("PROXY_API_KEY", "secret"), ("PORT", "")], || parse(&[]).load_config()).unwrap();
        assert_eq!(config.server.listen_address().port(), 8080);
    }

    #[test]
    fn invalid_port_fails() {
        let error = with_env(&[("PROXY_API_KEY", "secret"), ("PORT", "http")], || parse(&[]).load_config()).unwrap_err();
        assert!(error.to_string().contains("invalid port"));
    }

    #[test]
    fn flags_override_file() {
        let mut file = std::env::temp_dir();
        file.push(format!("relay-args-{}.toml", std::process::id()));
        std::fs::File::create(&file)
            .unwrap()
            .write_all(
                br#"
[server]
listen_address = "127.0.0.1:7000"
api_key = "from-file"

[backend]
default_model = "haiku"
"#,
            )
            .unwrap();

        let path = file.to_string_lossy().into_owned();
        let config = with_env(&[], || parse(&["--config", path.as_str(), "--port", "7001"]).load_config()).unwrap();
        std::fs::remove_file(&file).unwrap();

        assert_eq!(config.server.listen_address(), SocketAddr::from(([127, 0, 0, 1], 7001)));
        assert_eq!(config.backend.default_model, "haiku");
    }
}
