/**
 * config.rs
 * Database tuning configuration
 *
 * Pragmas and cache sizes applied when an interface opens its database.
 * Loaded from an optional YAML file; every field has a working default so a
 * missing file configures a usable store.
 */

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collation::DEFAULT_TITLE_ARTICLES;
use crate::errors::{Result, StoreError};

fn default_page_size() -> u32 {
    8192
}

fn default_cache_size() -> u32 {
    250
}

fn default_journal_mode() -> String {
    "WAL".to_string()
}

fn default_synchronous() -> String {
    "NORMAL".to_string()
}

fn default_stmt_cache_size() -> usize {
    100
}

fn default_busy_timeout_ms() -> u64 {
    100_000
}

fn default_title_articles() -> String {
    DEFAULT_TITLE_ARTICLES.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DbConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Page cache size in pages.
    #[serde(default = "default_cache_size")]
    pub cache_size: u32,

    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,

    #[serde(default = "default_synchronous")]
    pub synchronous: String,

    #[serde(default = "default_stmt_cache_size")]
    pub select_cache_size: usize,

    #[serde(default = "default_stmt_cache_size")]
    pub update_cache_size: usize,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// '|'-separated title articles skipped by the title collation.
    #[serde(default = "default_title_articles")]
    pub title_articles: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig {
            page_size: default_page_size(),
            cache_size: default_cache_size(),
            journal_mode: default_journal_mode(),
            synchronous: default_synchronous(),
            select_cache_size: default_stmt_cache_size(),
            update_cache_size: default_stmt_cache_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            title_articles: default_title_articles(),
        }
    }
}

impl DbConfig {
    /// Load from a YAML file; a missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DbConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(DbConfig::default());
        }

        let content = fs::read_to_string(path)?;
        let config: DbConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        match self.journal_mode.to_ascii_uppercase().as_str() {
            "WAL" | "DELETE" | "TRUNCATE" | "PERSIST" | "MEMORY" | "OFF" => {}
            other => {
                return Err(StoreError::Config(format!(
                    "invalid journal mode '{}'",
                    other
                )))
            }
        }

        match self.synchronous.to_ascii_uppercase().as_str() {
            "OFF" | "NORMAL" | "FULL" | "EXTRA" => {}
            other => {
                return Err(StoreError::Config(format!(
                    "invalid synchronous mode '{}'",
                    other
                )))
            }
        }

        if !self.page_size.is_power_of_two() || self.page_size < 512 {
            return Err(StoreError::Config(format!(
                "page size {} is not a power of two >= 512",
                self.page_size
            )));
        }

        Ok(())
    }
}
