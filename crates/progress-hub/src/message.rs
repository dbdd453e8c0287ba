//! Wire envelope and the standard progress payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SinkResult;

/// Envelope sent to every subscriber: `{"type": "progress", "data": ...}`.
#[derive(Debug, Serialize)]
struct Envelope<'a, T: ?Sized> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a T,
}

pub(crate) fn encode<T: Serialize + ?Sized>(event: &T) -> SinkResult<String> {
    let envelope = Envelope {
        kind: "progress",
        data: event,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Milestone reported by a long-running job such as a knowledge-base build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub message: String,
    pub current: u64,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            current: 0,
            total: 0,
            percent: None,
            timestamp: Utc::now(),
        }
    }

    /// Set `current` of `total`; `percent` is derived when `total > 0`.
    pub fn with_progress(mut self, current: u64, total: u64) -> Self {
        self.current = current;
        self.total = total;
        self.percent = (total > 0).then(|| current as f64 * 100.0 / total as f64);
        self
    }
}
