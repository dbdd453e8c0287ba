//! Error types for perf-tracker

use std::path::PathBuf;

use thiserror::Error;

/// Errors from persisting a summary. In-memory aggregates are never affected.
#[derive(Error, Debug)]
pub enum PerfError {
    #[error("failed to create performance directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write performance summary {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize performance summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for perf-tracker operations
pub type PerfResult<T> = std::result::Result<T, PerfError>;
