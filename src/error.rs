//! Error types for the insulin wave engine
//!
//! The wave computation itself never fails for structurally valid input:
//! missing data resolves to neutral defaults and degenerate numerics fall back
//! to safe values. These errors surface only at the edges (parsing, persistence,
//! configuration).

use thiserror::Error;

/// Errors that can occur while loading inputs or persisting state
#[derive(Debug, Error)]
pub enum WaveError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    #[error("Date parse error: {0}")]
    InvalidDate(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
