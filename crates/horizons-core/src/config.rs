//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/horizons/config.toml)
//! 3. Environment variables (HORIZONS_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::Provider;

/// Environment variable prefix
const ENV_PREFIX: &str = "HORIZONS";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for local state (task document, session)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Write logs here instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Cloud sync providers and timing
    #[serde(default)]
    pub sync: SyncSettings,
}

/// The `[sync]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// First-choice provider for new sessions
    pub primary: Provider,
    /// Fallback provider when the primary fails
    pub secondary: Provider,
    pub pantry_url: String,
    pub jsonbin_url: String,
    pub kvdb_url: String,
    /// Pantry basket name
    pub basket: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            primary: Provider::Pantry,
            secondary: Provider::JsonBin,
            pantry_url: "https://getpantry.cloud/apiv1".to_string(),
            jsonbin_url: "https://api.jsonbin.io/v3".to_string(),
            kvdb_url: "https://kvdb.io".to_string(),
            basket: "timestripe".to_string(),
            poll_interval_secs: 12,
            request_timeout_secs: 12,
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject settings the sync engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.primary == self.secondary {
            bail!(
                "sync.primary and sync.secondary must differ (both are '{}')",
                self.primary
            );
        }
        for (role, provider) in [("primary", self.primary), ("secondary", self.secondary)] {
            if !provider.is_current_generation() {
                bail!(
                    "sync.{} cannot be '{}': it is only read for migration",
                    role,
                    provider
                );
            }
        }
        if self.poll_interval_secs == 0 {
            bail!("sync.poll_interval_secs must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            bail!("sync.request_timeout_secs must be greater than zero");
        }
        if self.basket.trim().is_empty() {
            bail!("sync.basket must not be empty");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_file: None,
            sync: SyncSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (HORIZONS_DATA_DIR, HORIZONS_PRIMARY_PROVIDER, ...)
    /// 2. Config file (~/.config/horizons/config.toml or HORIZONS_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load from `--config` when given, otherwise the default location
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.sync.validate()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        config.sync.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // HORIZONS_DATA_DIR
        if let Some(val) = env_var("DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }

        // HORIZONS_LOG_FILE
        if let Some(val) = env_var("LOG_FILE") {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        // HORIZONS_PRIMARY_PROVIDER / HORIZONS_SECONDARY_PROVIDER
        if let Some(val) = env_var("PRIMARY_PROVIDER") {
            self.sync.primary = val
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid HORIZONS_PRIMARY_PROVIDER")?;
        }
        if let Some(val) = env_var("SECONDARY_PROVIDER") {
            self.sync.secondary = val
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid HORIZONS_SECONDARY_PROVIDER")?;
        }

        // HORIZONS_POLL_INTERVAL / HORIZONS_REQUEST_TIMEOUT (seconds)
        if let Some(val) = env_var("POLL_INTERVAL") {
            self.sync.poll_interval_secs = val
                .trim()
                .parse()
                .context("Invalid HORIZONS_POLL_INTERVAL")?;
        }
        if let Some(val) = env_var("REQUEST_TIMEOUT") {
            self.sync.request_timeout_secs = val
                .trim()
                .parse()
                .context("Invalid HORIZONS_REQUEST_TIMEOUT")?;
        }

        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Set a single key by its dotted name (`sync.primary`, `data_dir`, ...)
    ///
    /// The configuration is left unchanged when the result would not validate.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let mut next = self.clone();
        let none = value.is_empty() || value == "none";
        match key {
            "data_dir" => next.data_dir = PathBuf::from(value),
            "log_file" => next.log_file = (!none).then(|| PathBuf::from(value)),
            "sync.primary" => {
                next.sync.primary = value.parse().map_err(anyhow::Error::msg)?;
            }
            "sync.secondary" => {
                next.sync.secondary = value.parse().map_err(anyhow::Error::msg)?;
            }
            "sync.pantry_url" => next.sync.pantry_url = value.to_string(),
            "sync.jsonbin_url" => next.sync.jsonbin_url = value.to_string(),
            "sync.kvdb_url" => next.sync.kvdb_url = value.to_string(),
            "sync.basket" => next.sync.basket = value.to_string(),
            "sync.poll_interval_secs" => {
                next.sync.poll_interval_secs = value
                    .parse()
                    .context("Invalid value for sync.poll_interval_secs. Use whole seconds.")?;
            }
            "sync.request_timeout_secs" => {
                next.sync.request_timeout_secs = value
                    .parse()
                    .context("Invalid value for sync.request_timeout_secs. Use whole seconds.")?;
            }
            _ => bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                Self::KEYS.join(", ")
            ),
        }
        next.sync.validate()?;
        *self = next;
        Ok(())
    }

    /// Keys accepted by [`Config::set_value`]
    pub const KEYS: &'static [&'static str] = &[
        "data_dir",
        "log_file",
        "sync.primary",
        "sync.secondary",
        "sync.pantry_url",
        "sync.jsonbin_url",
        "sync.kvdb_url",
        "sync.basket",
        "sync.poll_interval_secs",
        "sync.request_timeout_secs",
    ];

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with HORIZONS_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_var("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("horizons")
            .join("config.toml")
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("horizons")
}
