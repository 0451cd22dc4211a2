//! Configuration management for greyscale.
//!
//! Configuration is loaded from the platform config directory with defaults
//! for every field, then selected values are overridden from the environment
//! the way a deployed function receives its topic identifiers.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `general.region`.
pub const ENV_REGION: &str = "GREYSCALE_REGION";
/// Environment variable overriding `topics.converted`.
pub const ENV_CONVERTED_TOPIC: &str = "GREYSCALE_CONVERTED_TOPIC";
/// Environment variable overriding `topics.errors`.
pub const ENV_ERROR_TOPIC: &str = "GREYSCALE_ERROR_TOPIC";
/// Environment variable overriding `topics.gallery`.
pub const ENV_GALLERY_TOPIC: &str = "GREYSCALE_GALLERY_TOPIC";

/// Root configuration structure for greyscale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Derived object naming
    pub naming: NamingConfig,

    /// Topic identifiers
    pub topics: TopicsConfig,

    /// Provenance index
    pub index: IndexConfig,

    /// Convert stage
    pub convert: ConvertConfig,

    /// Gallery page
    pub gallery: GalleryConfig,

    /// Local deployment wiring
    pub deployment: DeploymentConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location, then apply
    /// environment overrides.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.greyscale.greyscale/config.toml
    /// - Linux: ~/.config/greyscale/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\greyscale\config\config.toml
    ///
    /// Falls back to ~/.greyscale/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "greyscale", "greyscale")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".greyscale").join("config.toml")
            })
    }

    /// Override values from environment lookups. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(region) = var(ENV_REGION) {
            self.general.region = region;
        }
        if let Some(topic) = var(ENV_CONVERTED_TOPIC) {
            self.topics.converted = topic;
        }
        if let Some(topic) = var(ENV_ERROR_TOPIC) {
            self.topics.errors = topic;
        }
        if let Some(topic) = var(ENV_GALLERY_TOPIC) {
            self.topics.gallery = topic;
        }
    }

    /// Get the resolved gallery template path (with ~ expansion).
    pub fn gallery_template_path(&self) -> Option<PathBuf> {
        self.gallery.template.as_ref().map(|path| {
            let path_str = path.to_string_lossy();
            let expanded = shellexpand::tilde(&path_str);
            PathBuf::from(expanded.into_owned())
        })
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
