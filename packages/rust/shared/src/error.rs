//! Error types for techtree.
//!
//! Library crates use [`TechTreeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all techtree operations.
#[derive(Debug, thiserror::Error)]
pub enum TechTreeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The persisted route file does not match the step record layout.
    #[error("malformed route file {path:?}: {message}")]
    MalformedSchema { path: PathBuf, message: String },

    /// A step collection element that is neither a step nor a grouping.
    #[error("unknown step element: {message}")]
    UnknownStepElement { message: String },

    /// A selection outside the range of displayed search results.
    #[error("invalid selection {index}: expected 0..={max}")]
    InvalidSelection { index: usize, max: usize },

    /// The search index or the graph renderer could not be reached.
    #[error("engine unavailable: {0}")]
    Engine(String),

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TechTreeError>;

impl TechTreeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a schema error for the route file at `path`.
    pub fn malformed(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::MalformedSchema {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create an unknown-element error from any displayable message.
    pub fn unknown_element(msg: impl Into<String>) -> Self {
        Self::UnknownStepElement {
            message: msg.into(),
        }
    }

    /// Create an engine error from anything displayable.
    pub fn engine(err: impl std::fmt::Display) -> Self {
        Self::Engine(err.to_string())
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller can recover by asking the user again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidSelection { .. })
    }
}
