//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/sightings.sqlite"
//!
//! [index]
//! path = "./data/sightings-index.sqlite"
//!
//! [pagination]
//! default_size = 20
//! max_size = 2000
//! default_sort = ["occurredAt,desc"]
//!
//! [server]
//! bind = "127.0.0.1:8080"
//! application_name = "sightings"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Only `[db]` and `[index]` are required.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use sightings_core::page::{parse_sort_params, PageRequest, SortOrder};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Record store database.
#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Search index database. Kept apart from the record store so either can be
/// dropped and recreated independently.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub default_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_size: u32,
    #[serde(default)]
    pub default_sort: Vec<String>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_size: default_page_size(),
            max_size: default_max_page_size(),
            default_sort: Vec::new(),
        }
    }
}

fn default_page_size() -> u32 {
    20
}
fn default_max_page_size() -> u32 {
    2000
}

impl PaginationConfig {
    /// Build a page request from optional caller parameters.
    ///
    /// A missing or zero size falls back to `default_size`; sizes above
    /// `max_size` are clamped. No sort parameters means `default_sort`.
    pub fn resolve(
        &self,
        page: Option<u32>,
        size: Option<u32>,
        sort: &[String],
    ) -> sightings_core::Result<PageRequest> {
        let size = match size {
            None | Some(0) => self.default_size,
            Some(s) => s.min(self.max_size),
        };
        let sort = if sort.is_empty() {
            self.default_sort_orders()?
        } else {
            parse_sort_params(sort)?
        };
        Ok(PageRequest::new(page.unwrap_or(0), size)?.with_sort(sort))
    }

    pub fn default_sort_orders(&self) -> sightings_core::Result<Vec<SortOrder>> {
        parse_sort_params(&self.default_sort)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Prefix of the `X-{name}-alert` / `X-{name}-params` response headers.
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            application_name: default_application_name(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_application_name() -> String {
    "sightings".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
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

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.db.path == config.index.path {
        anyhow::bail!("db.path and index.path must point to different files");
    }

    // Validate pagination
    if config.pagination.default_size == 0 {
        anyhow::bail!("pagination.default_size must be >= 1");
    }
    if config.pagination.max_size < config.pagination.default_size {
        anyhow::bail!(
            "pagination.max_size ({}) must be >= pagination.default_size ({})",
            config.pagination.max_size,
            config.pagination.default_size
        );
    }
    config
        .pagination
        .default_sort_orders()
        .with_context(|| "Invalid pagination.default_sort")?;

    // Used verbatim in response header names
    let name = &config.server.application_name;
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        anyhow::bail!(
            "server.application_name must be non-empty ASCII letters, digits, '-' or '_': '{}'",
            name
        );
    }

    Ok(())
}
