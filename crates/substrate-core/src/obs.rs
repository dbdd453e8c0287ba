//! Run lifecycle events.
//!
//! Every event is an `info!` line with a stable `event` field so log
//! pipelines can filter on it regardless of message text.

use std::path::Path;

use tracing::{info, warn};

/// RAII guard that enters a run-scoped tracing span.
///
/// ```ignore
/// let _span = RunSpan::enter("5f0c…");
/// // every event logged here carries run_id
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("substrate.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_run_started(run_id: &str, monitoring: bool) {
    info!(event = "run.started", run_id = %run_id, monitoring = monitoring);
}

/// Emit event: run finished with its aggregate cost.
pub fn emit_run_finished(
    run_id: &str,
    total_duration_secs: f64,
    total_tokens: u64,
    citations: usize,
    total_errors: u64,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        total_duration_secs = total_duration_secs,
        total_tokens = total_tokens,
        citations = citations,
        total_errors = total_errors,
    );
}

pub fn emit_citations_allocated(run_id: &str, count: u64) {
    info!(event = "citations.allocated", run_id = %run_id, count = count);
}

pub fn emit_perf_persisted(run_id: &str, path: &Path) {
    info!(event = "perf.persisted", run_id = %run_id, path = %path.display());
}

/// Emit event: persisting the run summary failed (warning level).
pub fn emit_perf_persist_error(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "perf.persist_error", run_id = %run_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_span_enters_without_subscriber() {
        let _span = RunSpan::enter("test-run-id");
        emit_run_started("test-run-id", false);
    }
}
