//! Shared types, error model, and configuration for DocScout.
//!
//! This crate is the foundation depended on by all other DocScout crates.
//! It provides:
//! - [`DocScoutError`] — the unified error type
//! - Domain types ([`ResearchBundle`], [`FetchTarget`], [`FetchResult`],
//!   [`ExtractedPattern`], [`Gotcha`], [`CoverageReport`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, FetchConfig, FetchPoliciesConfig, ValidationConfig,
    cache_db_path, config_dir, config_file_path, expand_path, init_config, load_config,
    load_config_from,
};
pub use error::{DocScoutError, Result};
pub use types::{
    ArchPattern, BundleStatus, Category, CategoryCoverage, CoverageReport,
    CURRENT_SCHEMA_VERSION, ExtractedPattern, FetchResult, FetchStatus, FetchTarget, Gotcha,
    PatternKind, Priority, ResearchBundle, ResearchRequest, RunId, SignalKind,
};
