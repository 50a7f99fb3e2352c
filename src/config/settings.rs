use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

const ENV_TRANSACTIONAL_EXAMPLES: &str = "SCOPE_ONCE_TRANSACTIONAL_EXAMPLES";
const ENV_AMBITIOUS: &str = "SCOPE_ONCE_AMBITIOUS";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables read from `scope-once.toml` and the environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Run every example inside its own savepoint, rolled back afterwards
    pub transactional_examples: bool,
    /// Treat plain `before`/`let_value` declarations as once-setup everywhere
    pub ambitious: bool,
}

impl Settings {
    pub fn from_toml_str(contents: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load settings from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Apply `SCOPE_ONCE_*` environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(on) = env_flag(ENV_TRANSACTIONAL_EXAMPLES) {
            self.transactional_examples = on;
        }
        if let Some(on) = env_flag(ENV_AMBITIOUS) {
            self.ambitious = on;
        }
        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(variable = name, value = %raw, "ignoring unrecognized flag value");
            None
        }
    }
}
