//! Metrics spans and the handles used to feed them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of one named operation's metrics.
///
/// `end_time` and `duration` are `None` while the span is open. Times are
/// Unix epoch seconds; `duration` is measured on a monotonic clock and is
/// never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSpan {
    pub name: String,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub duration: Option<f64>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub api_calls: u64,
    pub error_count: u64,
    pub custom_metrics: BTreeMap<String, Value>,
}

impl MetricsSpan {
    fn open(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start_time: epoch_seconds(),
            end_time: None,
            duration: None,
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            api_calls: 0,
            error_count: 0,
            custom_metrics: BTreeMap::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }
}

fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[derive(Debug)]
pub(crate) struct SpanCell {
    metrics: MetricsSpan,
    started: Instant,
}

impl SpanCell {
    /// Close the span. Returns the closed snapshot on the open→closed
    /// transition and `None` if it was already closed.
    pub(crate) fn close(&mut self) -> Option<MetricsSpan> {
        if self.metrics.is_closed() {
            return None;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        self.metrics.duration = Some(elapsed);
        self.metrics.end_time = Some(self.metrics.start_time + elapsed);
        Some(self.metrics.clone())
    }

    pub(crate) fn snapshot(&self) -> MetricsSpan {
        self.metrics.clone()
    }
}

pub(crate) type SharedSpan = Arc<Mutex<SpanCell>>;

pub(crate) fn lock_span(span: &SharedSpan) -> MutexGuard<'_, SpanCell> {
    span.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a span returned by [`PerfTracker::begin`](crate::PerfTracker::begin).
///
/// Cloning is cheap. A handle from a disabled tracker is inert: every
/// mutator is a no-op and [`snapshot`](Self::snapshot) returns `None`.
#[derive(Debug, Clone)]
pub struct SpanHandle {
    name: Arc<str>,
    cell: Option<SharedSpan>,
}

impl SpanHandle {
    pub(crate) fn open(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            cell: Some(Arc::new(Mutex::new(SpanCell {
                metrics: MetricsSpan::open(name),
                started: Instant::now(),
            }))),
        }
    }

    pub(crate) fn inert(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            cell: None,
        }
    }

    pub(crate) fn cell(&self) -> Option<&SharedSpan> {
        self.cell.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this handle records anything.
    pub fn is_recording(&self) -> bool {
        self.cell.is_some()
    }

    fn update(&self, f: impl FnOnce(&mut MetricsSpan)) {
        if let Some(cell) = &self.cell {
            f(&mut lock_span(cell).metrics);
        }
    }

    /// Add token usage; `total_tokens` is recomputed from the two parts.
    pub fn add_tokens(&self, prompt: u64, completion: u64) {
        self.update(|m| {
            m.prompt_tokens += prompt;
            m.completion_tokens += completion;
            m.total_tokens = m.prompt_tokens + m.completion_tokens;
        });
    }

    pub fn add_api_call(&self) {
        self.update(|m| m.api_calls += 1);
    }

    pub fn add_error(&self) {
        self.update(|m| m.error_count += 1);
    }

    pub fn set_custom_metric(&self, key: impl Into<String>, value: impl Into<Value>) {
        let (key, value) = (key.into(), value.into());
        self.update(|m| {
            m.custom_metrics.insert(key, value);
        });
    }

    pub fn snapshot(&self) -> Option<MetricsSpan> {
        self.cell.as_ref().map(|cell| lock_span(cell).snapshot())
    }

    pub fn is_closed(&self) -> bool {
        self.snapshot().is_some_and(|m| m.is_closed())
    }

    pub(crate) fn same_span(&self, other: &SharedSpan) -> bool {
        self.cell.as_ref().is_some_and(|cell| Arc::ptr_eq(cell, other))
    }
}
