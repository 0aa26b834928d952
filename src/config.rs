//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/livescroll-digest/config.toml`
//!
//! Paths follow the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/livescroll-digest/`
//! - Data: `$XDG_DATA_HOME/livescroll-digest/` (the durable store)
//! - State/Logs: `$XDG_STATE_HOME/livescroll-digest/`

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::completion::CompletionSettings;
use crate::error::{Error, Result};
use crate::source::{default_feeds, FeedSource};

const APP_DIR: &str = "livescroll-digest";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(fallback))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Configured feeds; empty means the built-in defaults.
    #[serde(default)]
    pub feeds: Vec<FeedSource>,

    /// Default display order by feed id, used when no order has been saved.
    #[serde(default)]
    pub feed_order: Option<Vec<String>>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub completion: CompletionSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cache and archive bounds
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Minutes a fetched feed body stays fresh
    #[serde(default = "default_feed_ttl_minutes")]
    pub feed_ttl_minutes: i64,

    /// Items kept per feed in the archive
    #[serde(default = "default_max_archive_items")]
    pub max_archive_items: usize,

    /// Summaries kept in the summary/chat cache
    #[serde(default = "default_summary_limit")]
    pub summary_limit: usize,

    /// Items shown per feed before "load more"
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            feed_ttl_minutes: default_feed_ttl_minutes(),
            max_archive_items: default_max_archive_items(),
            summary_limit: default_summary_limit(),
            page_size: default_page_size(),
        }
    }
}

fn default_feed_ttl_minutes() -> i64 {
    10
}

fn default_max_archive_items() -> usize {
    200
}

fn default_summary_limit() -> usize {
    100
}

fn default_page_size() -> usize {
    15
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path, then fill API keys from the
    /// environment where the file leaves them unset.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };
        config.completion.fill_keys_from_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Configured feeds, or the defaults when none are configured.
    pub fn feeds(&self) -> Vec<FeedSource> {
        if self.feeds.is_empty() {
            default_feeds()
        } else {
            self.feeds.clone()
        }
    }

    pub fn config_path() -> PathBuf {
        xdg_dir("XDG_CONFIG_HOME", ".config")
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn data_dir() -> PathBuf {
        xdg_dir("XDG_DATA_HOME", ".local/share").join(APP_DIR)
    }

    pub fn state_dir() -> PathBuf {
        xdg_dir("XDG_STATE_HOME", ".local/state").join(APP_DIR)
    }

    /// `$XDG_DATA_HOME/livescroll-digest/store.json`
    pub fn store_path() -> PathBuf {
        Self::data_dir().join("store.json")
    }

    /// `$XDG_STATE_HOME/livescroll-digest/livescroll-digest.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("livescroll-digest.log")
    }
}
