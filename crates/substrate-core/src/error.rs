//! Error taxonomy for the substrate facade.

use std::path::PathBuf;

use citation_registry::CitationIdError;
use perf_tracker::PerfError;
use progress_hub::SinkError;
use structured_recovery::ValidationError;

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Substrate errors.
#[derive(Debug, thiserror::Error)]
pub enum SubstrateError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("performance error: {0}")]
    Perf(#[from] PerfError),

    #[error("delivery error: {0}")]
    Sink(#[from] SinkError),

    #[error("citation error: {0}")]
    Citation(#[from] CitationIdError),
}

/// Result type for substrate operations.
pub type Result<T> = std::result::Result<T, SubstrateError>;
