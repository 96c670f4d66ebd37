use std::path::Path;

use secrecy::ExposeSecret;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// The file is read, `{{ env.VAR }}` placeholders are expanded, and the
    /// result is deserialized. Validation is left to the caller because
    /// command-line overrides are usually applied afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a placeholder cannot be
    /// expanded, or the TOML is invalid
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");

        Ok(config)
    }

    /// Parse configuration from TOML text, expanding environment placeholders
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder cannot be expanded or the TOML is invalid
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))
    }

    /// Validate that the configuration can start a server
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or empty, or the backend
    /// command is empty
    pub fn validate(&self) -> anyhow::Result<()> {
        let has_key = self
            .server
            .api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().is_empty());

        if !has_key {
            anyhow::bail!("PROXY_API_KEY environment variable required (or set server.api_key in the config file)");
        }

        if self.backend.command.trim().is_empty() {
            anyhow::bail!("backend.command must not be empty");
        }

        if let Some(ref telemetry) = self.telemetry
            && !(0.0..=1.0).contains(&telemetry.sampling_rate)
        {
            anyhow::bail!("telemetry.sampling_rate must be between 0.0 and 1.0");
        }

        Ok(())
    }
}
