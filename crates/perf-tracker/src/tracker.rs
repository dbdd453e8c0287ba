//! The tracker: span index, aggregate totals, and persistence.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::{PerfError, PerfResult};
use crate::span::{lock_span, MetricsSpan, SharedSpan, SpanHandle};

/// Default directory for auto-named summaries.
pub const DEFAULT_SAVE_DIR: &str = "./logs/performance";

/// Collision suffixes tried before giving up on an auto-generated name.
const MAX_NAME_ATTEMPTS: u32 = 1_000;

/// Tracker configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerfConfig {
    pub enabled: bool,
    pub save_dir: PathBuf,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
        }
    }
}

/// Aggregate view returned by [`PerfTracker::summary`] and written by
/// [`PerfTracker::persist`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfSummary {
    /// Seconds, summed over closed spans
    pub total_duration: f64,
    pub total_tokens: u64,
    pub total_api_calls: u64,
    pub total_errors: u64,
    /// Latest span per name, open or closed
    pub agents: BTreeMap<String, MetricsSpan>,
}

#[derive(Debug, Default)]
struct Totals {
    duration: f64,
    tokens: u64,
    api_calls: u64,
    errors: u64,
}

impl Totals {
    fn fold(&mut self, closed: &MetricsSpan) {
        self.duration += closed.duration.unwrap_or_default();
        self.tokens += closed.total_tokens;
        self.api_calls += closed.api_calls;
        self.errors += closed.error_count;
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    spans: BTreeMap<String, SharedSpan>,
    totals: Totals,
}

/// Measures named operations and aggregates their cost.
///
/// One tracker per run. When disabled every operation is a cheap
/// pass-through that never touches storage.
#[derive(Debug, Default)]
pub struct PerfTracker {
    config: PerfConfig,
    state: Mutex<TrackerState>,
}

impl PerfTracker {
    pub fn new(config: PerfConfig) -> Self {
        Self {
            config,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(PerfConfig {
            enabled: false,
            ..PerfConfig::default()
        })
    }

    pub fn config(&self) -> &PerfConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a span named `name`, replacing any previous index entry for that
    /// name. Totals already folded in are not touched.
    pub fn begin(&self, name: &str) -> SpanHandle {
        if !self.config.enabled {
            return SpanHandle::inert(name);
        }
        let handle = SpanHandle::open(name);
        if let Some(cell) = handle.cell() {
            self.state().spans.insert(name.to_string(), cell.clone());
        }
        trace!(span = %name, "span started");
        handle
    }

    /// Close the latest span named `name`. No-op if there is none or it is
    /// already closed.
    pub fn end(&self, name: &str) {
        if !self.config.enabled {
            return;
        }
        let cell = self.state().spans.get(name).cloned();
        if let Some(cell) = cell {
            self.close(&cell);
        }
    }

    /// Close the exact span behind `handle`, even if a newer span with the
    /// same name has since replaced it in the index.
    pub fn end_span(&self, handle: &SpanHandle) {
        if let Some(cell) = handle.cell() {
            self.close(cell);
        }
    }

    fn close(&self, cell: &SharedSpan) {
        let closed = lock_span(cell).close();
        if let Some(closed) = closed {
            self.state().totals.fold(&closed);
            debug!(
                span = %closed.name,
                duration_secs = closed.duration.unwrap_or_default(),
                total_tokens = closed.total_tokens,
                errors = closed.error_count,
                "span closed"
            );
        }
    }

    /// Latest span recorded under `name`.
    pub fn get(&self, name: &str) -> Option<MetricsSpan> {
        let cell = self.state().spans.get(name).cloned();
        cell.map(|cell| lock_span(&cell).snapshot())
    }

    /// Whether the index holds `handle`'s span under its name.
    pub fn is_current(&self, handle: &SpanHandle) -> bool {
        self.state()
            .spans
            .get(handle.name())
            .is_some_and(|cell| handle.same_span(cell))
    }

    pub fn summary(&self) -> PerfSummary {
        let (cells, totals) = {
            let state = self.state();
            let cells: Vec<SharedSpan> = state.spans.values().cloned().collect();
            let t = &state.totals;
            (cells, (t.duration, t.tokens, t.api_calls, t.errors))
        };
        let agents = cells
            .iter()
            .map(|cell| {
                let snapshot = lock_span(cell).snapshot();
                (snapshot.name.clone(), snapshot)
            })
            .collect();

        PerfSummary {
            total_duration: totals.0,
            total_tokens: totals.1,
            total_api_calls: totals.2,
            total_errors: totals.3,
            agents,
        }
    }

    /// Clear every span and zero the totals.
    pub fn reset(&self) {
        *self.state() = TrackerState::default();
    }

    /// Write the summary as pretty JSON.
    ///
    /// With no `path`, writes `performance_<YYYYMMDD_HHMMSS_mmm>.json` under
    /// the configured directory, creating it if absent. Returns `None` when
    /// the tracker is disabled.
    pub fn persist(&self, path: Option<&Path>) -> PerfResult<Option<PathBuf>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let content = serde_json::to_string_pretty(&self.summary())?;

        let written = match path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    create_dir(parent)?;
                }
                std::fs::write(path, &content).map_err(|source| PerfError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
                path.to_path_buf()
            }
            None => {
                create_dir(&self.config.save_dir)?;
                write_new_file(&self.config.save_dir, &content)?
            }
        };

        info!(path = %written.display(), "performance summary saved");
        Ok(Some(written))
    }

    /// Human-readable report of totals and per-span details.
    pub fn render_summary(&self) -> String {
        let summary = self.summary();
        let rule = "=".repeat(60);
        let mut lines = vec![
            rule.clone(),
            "Performance Summary".to_string(),
            rule.clone(),
            format!("Total Duration: {:.2}s", summary.total_duration),
            format!("Total Tokens: {}", summary.total_tokens),
            format!("Total API Calls: {}", summary.total_api_calls),
            format!("Total Errors: {}", summary.total_errors),
        ];

        for (name, span) in &summary.agents {
            lines.push(String::new());
            lines.push(format!("{name}:"));
            lines.push(match span.duration {
                Some(d) => format!("  Duration: {d:.2}s"),
                None => "  Duration: N/A".to_string(),
            });
            lines.push(format!(
                "  Tokens: {} (prompt {}, completion {})",
                span.total_tokens, span.prompt_tokens, span.completion_tokens
            ));
            lines.push(format!("  API Calls: {}", span.api_calls));
            lines.push(format!("  Errors: {}", span.error_count));
            lines.extend(
                span.custom_metrics
                    .iter()
                    .map(|(key, value)| format!("  {key}: {value}")),
            );
        }
        lines.push(rule);
        lines.join("\n")
    }

    /// Emit the totals as a single `info!` event.
    pub fn log_summary(&self) {
        let summary = self.summary();
        info!(
            total_duration_secs = summary.total_duration,
            total_tokens = summary.total_tokens,
            total_api_calls = summary.total_api_calls,
            total_errors = summary.total_errors,
            spans = summary.agents.len(),
            "performance summary"
        );
    }
}

fn create_dir(dir: &Path) -> PerfResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| PerfError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Create a fresh timestamp-named file, adding `-n` on collision.
fn write_new_file(dir: &Path, content: &str) -> PerfResult<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let file_name = if attempt == 0 {
            format!("performance_{stamp}.json")
        } else {
            format!("performance_{stamp}-{attempt}.json")
        };
        let path = dir.join(file_name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(content.as_bytes())
                    .map_err(|source| PerfError::Write {
                        path: path.clone(),
                        source,
                    })?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(PerfError::Write { path, source }),
        }
    }

    let path = dir.join(format!("performance_{stamp}.json"));
    Err(PerfError::Write {
        path,
        source: std::io::Error::new(ErrorKind::AlreadyExists, "no free file name"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_without_begin_is_noop() {
        let tracker = PerfTracker::new(PerfConfig::default());
        tracker.end("never_started");
        let summary = tracker.summary();
        assert!(summary.agents.is_empty());
        assert_eq!(summary.total_duration, 0.0);
    }

    #[test]
    fn end_twice_folds_once() {
        let tracker = PerfTracker::new(PerfConfig::default());
        let span = tracker.begin("decompose_agent");
        span.add_tokens(50, 50);
        span.add_api_call();
        tracker.end("decompose_agent");
        tracker.end("decompose_agent");

        let summary = tracker.summary();
        assert_eq!(summary.total_tokens, 100);
        assert_eq!(summary.total_api_calls, 1);
        assert!(summary.agents["decompose_agent"].duration.is_some());
    }

    #[test]
    fn restart_replaces_index_entry_but_keeps_totals() {
        let tracker = PerfTracker::new(PerfConfig::default());
        let first = tracker.begin("rag_agent");
        first.add_tokens(10, 0);
        tracker.end("rag_agent");

        let second = tracker.begin("rag_agent");
        second.add_tokens(1, 1);
        assert!(!tracker.is_current(&first));
        assert!(tracker.is_current(&second));

        let summary = tracker.summary();
        assert_eq!(summary.total_tokens, 10);
        assert_eq!(summary.agents["rag_agent"].total_tokens, 2);
        assert!(summary.agents["rag_agent"].end_time.is_none());
    }

    #[test]
    fn end_span_closes_exact_span() {
        let tracker = PerfTracker::new(PerfConfig::default());
        let stale = tracker.begin("solve_agent");
        let fresh = tracker.begin("solve_agent");
        tracker.end_span(&stale);
        assert!(stale.is_closed());
        assert!(!fresh.is_closed());
    }

    #[test]
    fn disabled_tracker_is_passthrough() {
        let tracker = PerfTracker::disabled();
        let span = tracker.begin("x");
        span.add_tokens(1, 1);
        tracker.end("x");
        assert!(tracker.summary().agents.is_empty());
        assert!(tracker.get("x").is_none());
        assert!(tracker.persist(None).expect("disabled persist").is_none());
    }

    #[test]
    fn reset_clears_everything() {
        let tracker = PerfTracker::new(PerfConfig::default());
        tracker.begin("a").add_api_call();
        tracker.end("a");
        tracker.reset();
        let summary = tracker.summary();
        assert!(summary.agents.is_empty());
        assert_eq!(summary.total_api_calls, 0);
    }

    #[test]
    fn render_summary_lists_spans() {
        let tracker = PerfTracker::new(PerfConfig::default());
        let span = tracker.begin("plan_agent");
        span.add_tokens(3, 4);
        span.set_custom_metric("steps", 2);
        tracker.end("plan_agent");
        tracker.begin("open_agent");

        let report = tracker.render_summary();
        assert!(report.contains("Total Tokens: 7"));
        assert!(report.contains("plan_agent:"));
        assert!(report.contains("  steps: 2"));
        assert!(report.contains("open_agent:\n  Duration: N/A"));
    }

    #[test]
    fn render_summary_is_framed_by_rules() {
        let tracker = PerfTracker::new(PerfConfig::default());
        let report = tracker.render_summary();
        let rule = "=".repeat(60);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.first(), Some(&rule.as_str()));
        assert_eq!(lines.last(), Some(&rule.as_str()));
        assert_eq!(lines[1], "Performance Summary");
        assert_eq!(lines.len(), 8);
        assert!(!report.ends_with('\n'));
    }
}
