//! Configuration file handling

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Upstream subscription feed URLs
    #[serde(default)]
    pub feeds: Vec<String>,
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Default concurrency
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-probe connect timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Whole-run wall-clock budget in seconds (0 = unbounded)
    #[serde(default = "default_budget")]
    pub budget_seconds: u64,

    /// Maximum accepted latency in milliseconds
    #[serde(default = "default_threshold")]
    pub latency_threshold_ms: u64,
}

fn default_concurrency() -> usize {
    50
}

fn default_timeout() -> u64 {
    2
}

fn default_budget() -> u64 {
    0
}

fn default_threshold() -> u64 {
    3800
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_seconds: default_timeout(),
            budget_seconds: default_budget(),
            latency_threshold_ms: default_threshold(),
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("subsieve")
            .join("config.toml")
    }

    /// Load from default path
    pub fn load_default() -> Result<Option<Self>> {
        let path = Self::default_path();
        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Load from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {}", path.display(), e)))?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Save to a specific path
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::InvalidFile(format!("Failed to create directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidFile(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::InvalidFile(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
feeds = [
    "https://feeds.example/tcp",
    "https://mirror.example/sub",
]

[settings]
concurrency = 20
timeout_seconds = 3
latency_threshold_ms = 1200
"#;

        let config: ConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.settings.concurrency, 20);
        assert_eq!(config.settings.timeout_seconds, 3);
        assert_eq!(config.settings.latency_threshold_ms, 1200);
        // Unset fields keep their defaults
        assert_eq!(config.settings.budget_seconds, 0);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ConfigFile = toml::from_str("").unwrap();
        assert!(config.feeds.is_empty());
        assert_eq!(config.settings.concurrency, 50);
        assert_eq!(config.settings.latency_threshold_ms, 3800);
    }

    #[test]
    fn test_default_path() {
        let path = ConfigFile::default_path();
        assert!(path.to_string_lossy().contains("subsieve"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ConfigFile::default();
        config.feeds.push("https://feeds.example/tcp".to_string());
        config.settings.concurrency = 8;
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.feeds, config.feeds);
        assert_eq!(loaded.settings.concurrency, 8);
    }
}
