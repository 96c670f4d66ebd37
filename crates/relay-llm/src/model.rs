//! Mapping client model names onto the backend's model aliases

use std::fmt;

/// Vendor prefixes clients commonly put in front of the alias
const VENDOR_PREFIXES: [&str; 2] = ["claude-", "claude_"];

/// Model the backend CLI is invoked with
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalModel {
    Haiku,
    Sonnet,
    Opus,
    /// Unrecognized name passed through for the backend to accept or reject
    Other(String),
}

impl CanonicalModel {
    /// Known aliases in matching order
    pub const KNOWN: [Self; 3] = [Self::Haiku, Self::Sonnet, Self::Opus];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Haiku => "haiku",
            Self::Sonnet => "sonnet",
            Self::Opus => "opus",
            Self::Other(name) => name,
        }
    }

    /// Resolve a name without a fallback; `None` for empty input
    fn resolve(input: &str) -> Option<Self> {
        let lowered = input.trim().to_lowercase();
        let name = VENDOR_PREFIXES
            .iter()
            .find_map(|prefix| lowered.strip_prefix(prefix))
            .unwrap_or(lowered.as_str());

        if name.is_empty() {
            return None;
        }

        let known = Self::KNOWN
            .into_iter()
            .find(|model| name.starts_with(model.as_str()));

        Some(known.unwrap_or_else(|| Self::Other(name.to_owned())))
    }
}

impl fmt::Display for CanonicalModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves client-supplied model names, falling back to a fixed default
#[derive(Debug, Clone)]
pub struct ModelNormalizer {
    default: CanonicalModel,
}

impl ModelNormalizer {
    /// Build a normalizer whose fallback is `default`, itself normalized
    ///
    /// An empty default falls back to [`CanonicalModel::Sonnet`].
    pub fn new(default: &str) -> Self {
        Self {
            default: CanonicalModel::resolve(default).unwrap_or(CanonicalModel::Sonnet),
        }
    }

    pub const fn default_model(&self) -> &CanonicalModel {
        &self.default
    }

    /// Lower-case, trim, strip a `claude-`/`claude_` prefix, then match the
    /// known aliases by prefix; empty input yields the default
    pub fn normalize(&self, input: &str) -> CanonicalModel {
        CanonicalModel::resolve(input).unwrap_or_else(|| self.default.clone())
    }
}

impl Default for ModelNormalizer {
    fn default() -> Self {
        Self::new("sonnet")
    }
}
