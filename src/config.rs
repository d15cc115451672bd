// Configuration - TOML file under the user config dir, overridden by env vars

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::pricing::DEFAULT_CACHE_TTL_MINUTES;

pub const ENV_DB: &str = "STOCKFOLIO_DB";
pub const ENV_USER: &str = "STOCKFOLIO_USER";
pub const ENV_CONFIG: &str = "STOCKFOLIO_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file; `~/.stockfolio/data.db` when unset
    pub database: Option<PathBuf>,
    pub default_user: String,
    pub price_cache_minutes: i64,
    /// Filter used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            default_user: "default".to_string(),
            price_cache_minutes: DEFAULT_CACHE_TTL_MINUTES,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// `$STOCKFOLIO_CONFIG`, else `<config_home>/stockfolio/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        match std::env::var_os(ENV_CONFIG) {
            Some(path) => Some(PathBuf::from(path)),
            None => dir_spec::config_home().map(|dir| dir.join("stockfolio").join("config.toml")),
        }
    }

    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        if config.price_cache_minutes < 0 {
            anyhow::bail!("price_cache_minutes must not be negative");
        }
        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DB).filter(|v| !v.is_empty()) {
            self.database = Some(PathBuf::from(db));
        }
        if let Some(user) = lookup(ENV_USER).filter(|v| !v.is_empty()) {
            self.default_user = user;
        }
    }
}
