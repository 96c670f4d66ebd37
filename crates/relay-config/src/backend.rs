use serde::Deserialize;

/// How Relay launches the inference CLI
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Executable name or path
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments placed before the generated ones (e.g. a wrapper script)
    #[serde(default)]
    pub args: Vec<String>,
    /// Model used when a request leaves `model` empty
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            default_model: default_model(),
        }
    }
}

fn default_command() -> String {
    "claude".to_owned()
}

fn default_model() -> String {
    "sonnet".to_owned()
}
