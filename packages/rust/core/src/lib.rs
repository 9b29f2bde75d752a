//! Core pipeline orchestration and domain logic for DocScout.
//!
//! This crate ties together target resolution, fetching, extraction,
//! aggregation, coverage validation, and bundle writing into the end-to-end
//! research workflow ([`pipeline::run_research`]).

pub mod aggregate;
pub mod pipeline;
pub mod validate;
pub mod writer;

pub use pipeline::{
    ProgressReporter, ResearchConfig, ResearchOutcome, SilentProgress, run_research,
};
