//! Configuration Module
//!
//! Handles application configuration loading, validation, and management.
//! Priority (lowest to highest): defaults, system config
//! (`~/.config/wacrab/config.toml`), local config (`./wacrab.toml`),
//! environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Bot identity and behaviour
    #[serde(default)]
    pub bot: BotSettings,

    /// Web console configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bot identity and behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Display name, used in replies and as the linked-device name
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Command prefix (must be non-empty)
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Data directory holding the session store and log files
    #[serde(default = "wacrab_home")]
    pub data_dir: PathBuf,
}

fn default_bot_name() -> String {
    "WACRAB-MD".to_string()
}

fn default_prefix() -> String {
    ".".to_string()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            prefix: default_prefix(),
            data_dir: wacrab_home(),
        }
    }
}

/// Web console configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listen port (default: 3000, overridable via PORT)
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default: "0.0.0.0")
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(system_config_path) = Self::system_config_path()
            && system_config_path.exists()
        {
            tracing::debug!("Loading system config from: {:?}", system_config_path);
            config = Self::merge_from_file(&system_config_path)?;
        }

        let local_config_path = Self::local_config_path();
        if local_config_path.exists() {
            tracing::debug!("Loading local config from: {:?}", local_config_path);
            config = Self::merge_from_file(&local_config_path)?;
        }

        config = Self::apply_env_overrides(config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {:?}", path);
        }

        let config = Self::apply_env_overrides(Self::merge_from_file(path)?);
        config.validate()?;
        Ok(config)
    }

    /// Get the system config path: ~/.config/wacrab/config.toml
    fn system_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wacrab").join("config.toml"))
    }

    /// Get the local config path: ./wacrab.toml
    fn local_config_path() -> PathBuf {
        PathBuf::from("./wacrab.toml")
    }

    /// Load configuration from a TOML file (missing keys fall back to defaults)
    fn merge_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Self) -> Self {
        if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(p) => config.gateway.port = p,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
            }
        }

        if let Ok(level) = std::env::var("WACRAB_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(dir) = std::env::var("WACRAB_DATA_DIR") {
            config.bot.data_dir = PathBuf::from(dir);
        }

        config
    }

    /// Reject configurations the rest of the system assumes away.
    fn validate(&self) -> Result<()> {
        if self.bot.prefix.is_empty() {
            anyhow::bail!("bot.prefix must not be empty");
        }
        if self.bot.name.trim().is_empty() {
            anyhow::bail!("bot.name must not be empty");
        }
        Ok(())
    }

    /// Write this configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }
}

/// Data directory: ~/.wacrab (created on first use)
pub fn wacrab_home() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let p = home.join(".wacrab");
    if !p.exists() {
        let _ = std::fs::create_dir_all(&p);
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bot.name, "WACRAB-MD");
        assert_eq!(config.bot.prefix, ".");
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.gateway.bind, "0.0.0.0");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: Config =
            toml::from_str("[bot]\nname = \"TESTBOT\"\n").expect("partial config should parse");
        assert_eq!(config.bot.name, "TESTBOT");
        assert_eq!(config.bot.prefix, ".");
        assert_eq!(config.gateway.port, 3000);
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("wacrab.toml");

        let mut config = Config::default();
        config.bot.name = "ROUNDTRIP".to_string();
        config.gateway.port = 8123;
        config.save(&path).expect("save");

        let loaded = Config::load_from_path(&path).expect("reload");
        assert_eq!(loaded.bot.name, "ROUNDTRIP");
        // PORT env would override the file value; only assert when unset.
        if std::env::var("PORT").is_err() {
            assert_eq!(loaded.gateway.port, 8123);
        }
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("wacrab.toml");
        fs::write(&path, "[bot]\nprefix = \"\"\n").expect("write");

        assert!(Config::load_from_path(&path).is_err());
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(Config::load_from_path("/nonexistent/wacrab.toml").is_err());
    }
}
