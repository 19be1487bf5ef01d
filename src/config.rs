//! TOML configuration.
//!
//! ```toml
//! [storage]
//! container = "knowledge-base-direct"
//! connection_string_env = "AZURE_STORAGE_CONNECTION_STRING"
//! categories = ["sql", "definitions", "scripts", "data"]
//!
//! [cache]
//! ttl_secs = 300
//!
//! [server]
//! bind = "127.0.0.1:7341"
//!
//! [fallback]
//! url = "http://127.0.0.1:7331/tools/search"
//!
//! [aliases.sql]
//! "pro load" = "pro_load_calculation"
//! "перегрузка про" = "pro_load_calculation"
//! ```
//!
//! The storage connection string is never stored in this file. It is read
//! from the environment variable named by `connection_string_env`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::models::Category;
use crate::resolver::AliasTable;

/// Longest accepted listing-cache TTL (one day).
const MAX_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fallback: Option<FallbackConfig>,
    /// `category -> (term -> canonical artifact name)`.
    #[serde(default)]
    pub aliases: BTreeMap<Category, BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub container: String,
    #[serde(default = "default_connection_string_env")]
    pub connection_string_env: String,
    #[serde(default = "Category::builtin")]
    pub categories: Vec<Category>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_connection_string_env() -> String {
    "AZURE_STORAGE_CONNECTION_STRING".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// Secondary knowledge source consulted when no template exists.
#[derive(Debug, Deserialize, Clone)]
pub struct FallbackConfig {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.timeout_secs)
    }

    /// Read the storage connection string from the configured variable.
    pub fn connection_string(&self) -> Result<String> {
        std::env::var(&self.storage.connection_string_env).with_context(|| {
            format!(
                "{} environment variable not set",
                self.storage.connection_string_env
            )
        })
    }

    /// Build the immutable alias table.
    pub fn alias_table(&self) -> Result<AliasTable> {
        AliasTable::from_entries(self.aliases.iter()).context("Invalid [aliases] configuration")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.storage.container.trim().is_empty() {
        anyhow::bail!("storage.container must not be empty");
    }

    if config.storage.categories.is_empty() {
        anyhow::bail!("storage.categories must list at least one category");
    }

    if config.storage.timeout_secs == 0 {
        anyhow::bail!("storage.timeout_secs must be > 0");
    }

    if config.cache.ttl_secs > MAX_CACHE_TTL_SECS {
        anyhow::bail!("cache.ttl_secs must be <= {}", MAX_CACHE_TTL_SECS);
    }

    for category in config.aliases.keys() {
        if !config.storage.categories.contains(category) {
            anyhow::bail!(
                "[aliases.{}] refers to a category not listed in storage.categories",
                category
            );
        }
    }

    if let Some(ref fallback) = config.fallback {
        if !(fallback.url.starts_with("http://") || fallback.url.starts_with("https://")) {
            anyhow::bail!("fallback.url must be an http(s) URL");
        }
    }

    // Surface alias conflicts at load time rather than on first lookup.
    config.alias_table()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = parse_config("[storage]\ncontainer = \"kb\"\n").unwrap();
        assert_eq!(cfg.storage.connection_string_env, "AZURE_STORAGE_CONNECTION_STRING");
        assert_eq!(cfg.storage.categories, Category::builtin());
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(300));
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
        assert!(cfg.fallback.is_none());
        assert!(cfg.aliases.is_empty());
    }

    #[test]
    fn test_aliases_parse_multilingual_keys() {
        let cfg = parse_config(
            r#"
[storage]
container = "kb"

[aliases.sql]
"pro load" = "pro_load_calculation"
"перегрузка про" = "pro_load_calculation"
"#,
        )
        .unwrap();
        let table = cfg.alias_table().unwrap();
        assert_eq!(
            table.lookup(&Category::sql(), "Перегрузка Про"),
            Some("pro_load_calculation")
        );
    }

    #[test]
    fn test_conflicting_aliases_rejected() {
        let err = parse_config(
            r#"
[storage]
container = "kb"

[aliases.sql]
"Load" = "a"
"load" = "b"
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("aliases"));
    }

    #[test]
    fn test_alias_category_must_be_configured() {
        let err = parse_config(
            r#"
[storage]
container = "kb"
categories = ["sql"]

[aliases.data]
"x" = "y"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("aliases.data"));
    }

    #[test]
    fn test_invalid_category_rejected() {
        assert!(parse_config("[storage]\ncontainer = \"kb\"\ncategories = [\"../etc\"]\n").is_err());
    }

    #[test]
    fn test_extra_category_allowed() {
        let cfg = parse_config(
            "[storage]\ncontainer = \"kb\"\ncategories = [\"sql\", \"dashboards\"]\n",
        )
        .unwrap();
        assert!(cfg.storage.categories.contains(&Category::new("dashboards").unwrap()));
    }

    #[test]
    fn test_ttl_upper_bound() {
        assert!(parse_config("[storage]\ncontainer = \"kb\"\n[cache]\nttl_secs = 999999\n").is_err());
    }

    #[test]
    fn test_fallback_url_must_be_http() {
        assert!(parse_config("[storage]\ncontainer = \"kb\"\n[fallback]\nurl = \"ftp://x\"\n").is_err());
        let cfg =
            parse_config("[storage]\ncontainer = \"kb\"\n[fallback]\nurl = \"http://localhost:7331/tools/search\"\n")
                .unwrap();
        assert_eq!(cfg.fallback.unwrap().timeout_secs, 30);
    }
}
