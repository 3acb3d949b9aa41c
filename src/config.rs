use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "wordpace";
const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Owner of the remote documents. Empty means signed out.
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: i64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,
    #[serde(default = "default_theme")]
    pub theme: String,
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .to_string_lossy()
        .to_string()
}
fn default_cache_ttl_minutes() -> i64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_tick_rate_ms() -> u64 {
    100
}
fn default_theme() -> String {
    "default".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            data_dir: default_data_dir(),
            cache_ttl_minutes: default_cache_ttl_minutes(),
            log_level: default_log_level(),
            tick_rate_ms: default_tick_rate_ms(),
            theme: default_theme(),
        }
    }
}

/// Values given on the command line; they win over the config file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub user_id: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("invalid config at {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(user_id) = overrides.user_id {
            self.user_id = user_id;
        }
        if let Some(dir) = overrides.data_dir {
            self.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
    }

    /// Clamp out-of-range values back to something usable.
    pub fn validate(&mut self) {
        self.user_id = self.user_id.trim().to_string();
        self.cache_ttl_minutes = self.cache_ttl_minutes.clamp(1, 24 * 60);
        self.tick_rate_ms = self.tick_rate_ms.clamp(16, 1000);
        self.log_level = self.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            self.log_level = default_log_level();
        }
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
    }

    pub fn user(&self) -> Option<String> {
        (!self.user_id.is_empty()).then(|| self.user_id.clone())
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cache_ttl_minutes)
    }

    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("cache")
    }

    pub fn remote_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("remote")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("logs")
    }
}
