//! CLI configuration management

use anyhow::{Context, Result, anyhow};
use discovery::WatcherSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub general: GeneralSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub watcher: WatcherTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub log_level: String,
}

/// Enumeration provider tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Seconds a fetched device list stays valid
    #[serde(default = "DiscoverySettings::default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Restrict listings to mass-storage devices unless overridden
    #[serde(default = "DiscoverySettings::default_only_storage")]
    pub only_storage: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: Self::default_cache_ttl_secs(),
            only_storage: Self::default_only_storage(),
        }
    }
}

impl DiscoverySettings {
    fn default_cache_ttl_secs() -> u64 {
        3
    }

    fn default_only_storage() -> bool {
        true
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Drive watcher tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherTuning {
    /// Upper bound on one notification wait in milliseconds
    #[serde(default = "WatcherTuning::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long stop() waits for the watcher thread in seconds
    #[serde(default = "WatcherTuning::default_join_timeout_secs")]
    pub join_timeout_secs: u64,
}

impl Default for WatcherTuning {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            join_timeout_secs: Self::default_join_timeout_secs(),
        }
    }
}

impl WatcherTuning {
    fn default_poll_interval_ms() -> u64 {
        1000
    }

    fn default_join_timeout_secs() -> u64 {
        2
    }

    pub fn to_settings(&self) -> WatcherSettings {
        WatcherSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            join_timeout: Duration::from_secs(self.join_timeout_secs),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            general: GeneralSettings {
                log_level: "info".to_string(),
            },
            discovery: DiscoverySettings::default(),
            watcher: WatcherTuning::default(),
        }
    }
}

impl WatchConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidate = Self::default_path();
            if !candidate.exists() {
                return Err(anyhow!("No configuration file found, using defaults"));
            }
            candidate
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: WatchConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Falling back to default config: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb-watch").join("config.toml")
        } else {
            PathBuf::from(".config/usb-watch/config.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.general.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.watcher.poll_interval_ms == 0 {
            return Err(anyhow!("watcher.poll_interval_ms must be greater than 0"));
        }

        Ok(())
    }
}
