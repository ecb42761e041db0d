//! Shared types, error model, and configuration for techtree.
//!
//! This crate is the foundation depended on by all other techtree crates.
//! It provides:
//! - [`TechTreeError`] — the unified error type
//! - Domain types ([`Step`], [`Grouping`], [`StepNode`], [`StepId`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_PALETTE, DefaultsConfig, RenderConfig, SearchConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{Result, TechTreeError};
pub use types::{Grouping, Step, StepDraft, StepId, StepNode, flatten, walk};
