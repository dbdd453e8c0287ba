//! Error types for citation-registry

use thiserror::Error;

/// A string could not be read as a `[n]` citation id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CitationIdError {
    #[error("citation id must look like [n]: {0:?}")]
    Malformed(String),

    #[error("citation ids start at [1]")]
    Zero,
}
