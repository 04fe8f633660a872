//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable selecting development or production behavior.
pub const ENV_VAR: &str = "EMBER_ENV";

/// Settings for hydration and mounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Production mode silences mismatch warnings.
    pub production: bool,
    /// Log a warning for every repaired hydration mismatch.
    pub warn_on_mismatch: bool,
    /// Event types whose root listener is installed at mount time rather
    /// than on first use.
    pub delegated_events: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            production: false,
            warn_on_mismatch: true,
            delegated_events: Vec::new(),
        }
    }
}

impl Config {
    pub fn production() -> Self {
        Self {
            production: true,
            ..Self::default()
        }
    }

    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build a config from `EMBER_ENV`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_value(std::env::var(ENV_VAR).ok().as_deref())
    }

    fn from_env_value(value: Option<&str>) -> Result<Self, ConfigError> {
        match value.map(str::trim) {
            None | Some("") | Some("development") | Some("dev") | Some("test") => {
                Ok(Self::default())
            }
            Some("production") | Some("prod") => Ok(Self::production()),
            Some(other) => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }

    pub fn reports_mismatches(&self) -> bool {
        !self.production && self.warn_on_mismatch
    }
}
