//! Error types for progress-hub

use std::time::Duration;

use thiserror::Error;

/// Delivery failure reported by a [`ProgressSink`](crate::ProgressSink).
///
/// The hub treats every variant the same way: the subscriber is pruned.
/// Nothing here is returned from [`ProgressHub::broadcast`](crate::ProgressHub::broadcast).
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("subscriber connection is closed")]
    Closed,

    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to encode progress message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = std::result::Result<T, SinkError>;
