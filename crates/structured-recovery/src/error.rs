//! Error types for structured-recovery

use thiserror::Error;

/// Errors raised by the strict validation helpers.
///
/// Unlike tiered recovery, validation never degrades: the caller declared a
/// hard requirement on the shape of the data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value was expected to be a JSON object
    #[error("{0}")]
    NotAMapping(String),

    /// Value was expected to be a JSON array
    #[error("{0}")]
    NotASequence(String),

    /// One or more required keys are absent
    #[error("missing required keys: {}", keys.join(", "))]
    MissingKeys { keys: Vec<String> },
}

/// Errors produced by a [`Repair`](crate::Repair) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepairError {
    /// No `{` or `[` anywhere in the input
    #[error("no structured data found in {0} bytes of input")]
    NoStructure(usize),

    /// The repairer ran but could not produce parseable output
    #[error("repair produced unparseable output: {0}")]
    Unparseable(String),
}

/// Result type for validation helpers
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
