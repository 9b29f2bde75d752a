//! Application configuration for DocScout.
//!
//! User config lives at `~/.docscout/docscout.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocScoutError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docscout";

/// File name of the URL cache database inside the config directory.
const CACHE_DB_NAME: &str = "cache.db";

// ---------------------------------------------------------------------------
// Config structs (matching docscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Fetch policies.
    #[serde(default)]
    pub fetch: FetchPoliciesConfig,

    /// Completeness gate settings.
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default bundle output directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Overall run timeout in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            run_timeout_secs: default_run_timeout(),
        }
    }
}

fn default_output_dir() -> String {
    "~/docscout-bundles".into()
}
fn default_run_timeout() -> u64 {
    300
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchPoliciesConfig {
    /// Maximum concurrent fetches across all hosts.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Maximum concurrent fetches per host.
    #[serde(default = "default_per_host")]
    pub per_host_concurrency: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Retry attempts after the initial request for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Backoff multiplier applied per attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// URL cache entry lifetime in hours.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_hours: u64,
}

impl Default for FetchPoliciesConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            per_host_concurrency: default_per_host(),
            timeout_secs: default_fetch_timeout(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base(),
            backoff_factor: default_backoff_factor(),
            cache_ttl_hours: default_cache_ttl(),
        }
    }
}

fn default_concurrency() -> u32 {
    8
}
fn default_per_host() -> u32 {
    2
}
fn default_fetch_timeout() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base() -> u64 {
    500
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_cache_ttl() -> u64 {
    24
}

/// `[validation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Overall score required for a bundle to be complete.
    #[serde(default = "default_threshold")]
    pub completeness_threshold: f64,

    /// Minimum individual score for critical categories.
    #[serde(default = "default_critical_floor")]
    pub critical_floor: f64,

    /// Maximum supplemental resolve-fetch-extract cycles per run.
    #[serde(default = "default_supplemental_passes")]
    pub max_supplemental_passes: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            completeness_threshold: default_threshold(),
            critical_floor: default_critical_floor(),
            max_supplemental_passes: default_supplemental_passes(),
        }
    }
}

fn default_threshold() -> f64 {
    0.85
}
fn default_critical_floor() -> f64 {
    0.6
}
fn default_supplemental_passes() -> u32 {
    2
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum concurrent fetches across all hosts.
    pub concurrency: u32,
    /// Maximum concurrent fetches per host.
    pub per_host_concurrency: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retry attempts after the initial request.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Backoff multiplier applied per attempt.
    pub backoff_factor: f64,
    /// URL cache entry lifetime in hours.
    pub cache_ttl_hours: u64,
    /// Whether to consult/populate the URL cache.
    pub use_cache: bool,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.fetch.concurrency,
            per_host_concurrency: config.fetch.per_host_concurrency,
            timeout_secs: config.fetch.timeout_secs,
            max_retries: config.fetch.max_retries,
            backoff_base_ms: config.fetch.backoff_base_ms,
            backoff_factor: config.fetch.backoff_factor,
            cache_ttl_hours: config.fetch.cache_ttl_hours,
            use_cache: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docscout/docscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Get the path to the URL cache database (`~/.docscout/cache.db`).
pub fn cache_db_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CACHE_DB_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocScoutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocScoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| DocScoutError::config("could not determine home directory"))?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(raw))
    }
}
