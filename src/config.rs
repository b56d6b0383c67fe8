//! Plugin configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by the user's config file; the file only needs the keys it wants
//! to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! repository_name = "my-repo"   # Required
//! access_token = "..."          # Optional, for private repositories
//! lang = "*"                    # Locale to fetch, "*" for all
//! page_size = 100               # Documents per API page (1-100)
//! fetch_links = []              # "type.field" values to embed in links
//! type_prefix = "Prismic"       # Prefix of every generated type name
//! schemas_dir = "schemas"       # <custom_type>.json schema files
//! max_depth = 32                # Nesting limit for groups and slices
//!
//! [images]
//! localize = true               # Fetch image files as local file nodes
//! assets_dir = "assets"         # Local mirror the CLI fetches images from
//!
//! [routes]
//! page = "/:uid/"               # Route pattern per custom type
//!
//! [processing]
//! max_threads = 4               # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::link::{ROUTE_PLACEHOLDERS, route_placeholders};
use crate::normalize::{DEFAULT_MAX_DEPTH, DEFAULT_TYPE_PREFIX};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Largest page size the CMS API accepts.
pub const MAX_PAGE_SIZE: usize = 100;

/// Plugin options loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginOptions {
    /// Name of the CMS repository (`<name>.prismic.io`).
    pub repository_name: String,
    pub access_token: Option<String>,
    /// Locale to query, `*` for every locale.
    pub lang: String,
    pub page_size: usize,
    /// `custom_type.field` values whose content is embedded in document links.
    pub fetch_links: Vec<String>,
    pub type_prefix: String,
    /// Directory of custom type schemas, relative to the config directory.
    pub schemas_dir: String,
    /// Nesting limit for groups and slices, in schemas and in content.
    pub max_depth: usize,
    pub images: ImagesConfig,
    /// Route pattern per custom type, used as the link resolver.
    pub routes: BTreeMap<String, String>,
    pub processing: ProcessingConfig,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            repository_name: String::new(),
            access_token: None,
            lang: "*".to_string(),
            page_size: MAX_PAGE_SIZE,
            fetch_links: Vec::new(),
            type_prefix: DEFAULT_TYPE_PREFIX.to_string(),
            schemas_dir: "schemas".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            images: ImagesConfig::default(),
            routes: BTreeMap::new(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PluginOptions {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repository_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "repository_name must not be empty".into(),
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Validation(format!(
                "page_size must be 1-{MAX_PAGE_SIZE}"
            )));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Validation(
                "max_depth must be at least 1".into(),
            ));
        }
        if !self
            .type_prefix
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
        {
            return Err(ConfigError::Validation(
                "type_prefix must start with a letter".into(),
            ));
        }
        for link in &self.fetch_links {
            if link.split('.').count() != 2 || link.split('.').any(str::is_empty) {
                return Err(ConfigError::Validation(format!(
                    "fetch_links entry '{link}' must be 'custom_type.field'"
                )));
            }
        }
        for (custom_type, pattern) in &self.routes {
            if let Some(unknown) = route_placeholders(pattern)
                .into_iter()
                .find(|p| !ROUTE_PLACEHOLDERS.contains(&p.as_str()))
            {
                return Err(ConfigError::Validation(format!(
                    "routes.{custom_type}: unknown placeholder ':{unknown}'"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Ask the remote-file fetcher for every image URL.
    pub localize: bool,
    /// Local mirror directory used by the CLI's fetcher.
    pub assets_dir: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            localize: true,
            assets_dir: "assets".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers. When absent, defaults to the number
    /// of CPU cores. Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config, clamped to available cores.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.clamp(1, cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Serialize the stock defaults as a TOML value, the base every user config
/// is merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PluginOptions::default())?)
}

/// Deep-merge two TOML values. Tables merge key by key; any other overlay
/// value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `config.toml` from a directory as a raw TOML value, if present.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an overlay onto a base, deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PluginOptions, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PluginOptions = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load plugin options from `dir/config.toml` on top of the stock defaults.
pub fn load_config(dir: &Path) -> Result<PluginOptions, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// A documented config file with every option at its default.
pub fn stock_config_toml() -> &'static str {
    r##"# prismic-graph Configuration
# ===========================
# Only repository_name is required. Values shown below are the defaults.
# Unknown keys will cause an error.

# Name of the CMS repository (<name>.prismic.io).
repository_name = "your-repo-name"

# Access token for private repositories.
# access_token = ""

# Locale to fetch. "*" fetches every locale.
lang = "*"

# Documents per API page (1-100).
page_size = 100

# Linked document fields to embed in link values, as "custom_type.field".
fetch_links = []

# Prefix of every generated node and type name.
type_prefix = "Prismic"

# Directory holding one <custom_type>.json schema per custom type,
# relative to this file.
schemas_dir = "schemas"

# Nesting limit for groups and slices. Deeper fields are passed through
# unchanged (content) or typed as unprocessed JSON (schemas).
max_depth = 32

# ---------------------------------------------------------------------------
# Images
# ---------------------------------------------------------------------------
[images]
# Localize image URLs as file nodes. Failed fetches leave localFile null.
localize = true

# Local mirror of the image CDN, keyed by file name.
assets_dir = "assets"

# ---------------------------------------------------------------------------
# Routes
# ---------------------------------------------------------------------------
# One route pattern per custom type. Placeholders: :uid :id :lang :type
# Documents of types without a pattern get a null url.
[routes]
# page = "/:uid/"
# blog_post = "/:lang/blog/:uid/"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel normalization workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_threads = 4
"##
}
