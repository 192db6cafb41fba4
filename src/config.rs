//! Blueprint Configuration Module
//!
//! Persistent defaults for the CLI, stored in `~/.config/blueprint/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Command-line flags (`--on-error`, `--context`)
//! 2. Environment variables (`BLUEPRINT_ON_ERROR`)
//! 3. Config file
//! 4. Defaults
//!
//! Context values are layered differently: config `[context]` only fills keys
//! the blueprint itself does not define.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{BlueprintError, Result};
use crate::runtime::OnError;
use crate::util::constants::ON_ERROR_ENV;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BlueprintConfig {
    #[serde(default)]
    pub defaults: Defaults,

    /// Default context values
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Default settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Defaults {
    /// What to do when an entry fails (abort, skip)
    pub on_error: Option<OnError>,
}

impl BlueprintConfig {
    /// Returns `~/.config/blueprint/` on Unix, `%APPDATA%/blueprint/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("blueprint")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load the user configuration (default config if there is none)
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from `path`.
    ///
    /// Returns default config if the file doesn't exist, and an error if it
    /// exists but is malformed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| BlueprintError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        toml::from_str(&content).map_err(|e| BlueprintError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Write configuration to `path`, creating parent directories
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| BlueprintError::ConfigError {
                    reason: format!("Failed to create config directory: {}", e),
                })?;
            }
        }

        let content = toml::to_string_pretty(self).map_err(|e| BlueprintError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| BlueprintError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })?;

        Ok(())
    }

    /// Merge with environment variables (environment wins)
    pub fn with_env(mut self) -> Self {
        if let Ok(value) = std::env::var(ON_ERROR_ENV) {
            match value.parse::<OnError>() {
                Ok(on_error) => self.defaults.on_error = Some(on_error),
                Err(e) => warn!(var = ON_ERROR_ENV, value = %value, "{}", e),
            }
        }
        self
    }

    /// Effective error policy
    pub fn on_error(&self) -> OnError {
        self.defaults.on_error.unwrap_or_default()
    }
}
