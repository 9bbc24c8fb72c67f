//! Application configuration management.
//!
//! This module handles loading the application configuration:
//! the origin that cache-through fetches resolve against, the current cache
//! version tag, the drug API base URL and an optional data directory.
//!
//! Configuration is stored at `~/.config/clinicache/config.json`.
//! `CLINICACHE_ORIGIN` and `CLINICACHE_DATA_DIR` override the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_DRUG_API_BASE;
use crate::offline::DEFAULT_CACHE_VERSION;

/// Application name used for config/cache/data directory paths
pub const APP_NAME: &str = "clinicache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Durable preferences file name, kept next to the config
const PREFERENCES_FILE: &str = "preferences.json";

const DEFAULT_ORIGIN: &str = "http://localhost:5173";

const ORIGIN_ENV: &str = "CLINICACHE_ORIGIN";
const DATA_DIR_ENV: &str = "CLINICACHE_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub origin: String,
    pub cache_version: String,
    pub drug_api_base: String,
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            cache_version: DEFAULT_CACHE_VERSION.to_string(),
            drug_api_base: DEFAULT_DRUG_API_BASE.to_string(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults when absent), then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Blank values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key| lookup(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(origin) = non_blank(ORIGIN_ENV) {
            self.origin = origin;
        }
        if let Some(dir) = non_blank(DATA_DIR_ENV) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn preferences_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(PREFERENCES_FILE))
    }

    /// Root of the offline cache buckets.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Directory holding the doctor and appointment collections.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
