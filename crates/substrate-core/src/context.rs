//! Run-scoped state and the process-wide substrate it is drawn from.

use std::path::PathBuf;
use std::sync::Arc;

use citation_registry::{CitationId, CitationRegistry, NewCitation};
use perf_tracker::{PerfSummary, PerfTracker};
use progress_hub::{channel_sink, ChannelSink, ProgressHub};
use structured_recovery::RecoveryPipeline;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::SubstrateConfig;
use crate::error::Result;
use crate::obs;

/// Shared, process-wide pieces: the progress hub and the configuration each
/// run is built from.
///
/// The hub is the one intentionally global component. Citation numbering and
/// telemetry live in a [`RunContext`] per run.
#[derive(Debug)]
pub struct Substrate {
    config: SubstrateConfig,
    hub: Arc<ProgressHub>,
    pipeline: Arc<RecoveryPipeline>,
}

impl Substrate {
    pub fn new(config: SubstrateConfig) -> Self {
        let hub = Arc::new(ProgressHub::new(config.progress.hub_config()));
        let pipeline = Arc::new(RecoveryPipeline::from_config(&config.recovery));
        Self {
            config,
            hub,
            pipeline,
        }
    }

    pub fn config(&self) -> &SubstrateConfig {
        &self.config
    }

    pub fn hub(&self) -> Arc<ProgressHub> {
        self.hub.clone()
    }

    pub fn pipeline(&self) -> Arc<RecoveryPipeline> {
        self.pipeline.clone()
    }

    /// A sink sized by `progress.channel_buffer`, for transport adapters.
    pub fn sink(&self) -> (ChannelSink, mpsc::Receiver<String>) {
        channel_sink(self.config.progress.channel_buffer)
    }

    /// Start a fresh run with its own citation numbering and tracker.
    pub fn start_run(&self) -> RunContext {
        RunContext::new(&self.config)
    }
}

/// Everything scoped to a single user request.
///
/// Two concurrent runs never share numbering or telemetry.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: Uuid,
    pub citations: CitationRegistry,
    pub tracker: Arc<PerfTracker>,
}

impl RunContext {
    pub fn new(config: &SubstrateConfig) -> Self {
        let run_id = Uuid::new_v4();
        let tracker = Arc::new(PerfTracker::new(config.monitoring.clone()));
        obs::emit_run_started(&run_id.to_string(), tracker.is_enabled());
        Self {
            run_id,
            citations: CitationRegistry::new(),
            tracker,
        }
    }

    pub fn span(&self) -> obs::RunSpan {
        obs::RunSpan::enter(&self.run_id.to_string())
    }

    pub fn cite(&self, citation: impl Into<NewCitation>) -> CitationId {
        self.citations.allocate(citation)
    }

    /// Log the summary, persist it when monitoring is enabled, and emit
    /// `run.finished`.
    ///
    /// A persistence failure is returned after the finish event is logged;
    /// in-memory state is untouched either way.
    pub fn finish(&self) -> Result<Option<PathBuf>> {
        let run_id = self.run_id.to_string();
        let summary: PerfSummary = self.tracker.summary();
        let citations = self.citations.counter();

        obs::emit_citations_allocated(&run_id, citations);
        self.tracker.log_summary();

        let persisted = self.tracker.persist(None);
        match &persisted {
            Ok(Some(path)) => obs::emit_perf_persisted(&run_id, path),
            Ok(None) => {}
            Err(e) => obs::emit_perf_persist_error(&run_id, e),
        }

        obs::emit_run_finished(
            &run_id,
            summary.total_duration,
            summary.total_tokens,
            self.citations.len(),
            summary.total_errors,
        );
        Ok(persisted?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perf_tracker::PerfConfig;

    fn config_in(dir: &std::path::Path, enabled: bool) -> SubstrateConfig {
        SubstrateConfig {
            monitoring: PerfConfig {
                enabled,
                save_dir: dir.to_path_buf(),
            },
            ..SubstrateConfig::default()
        }
    }

    #[test]
    fn runs_do_not_share_numbering() {
        let substrate = Substrate::new(SubstrateConfig::default());
        let first = substrate.start_run();
        let second = substrate.start_run();

        assert_eq!(first.cite("k1").to_string(), "[1]");
        assert_eq!(first.cite("k2").to_string(), "[2]");
        assert_eq!(second.cite("k9").to_string(), "[1]");
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn finish_persists_when_enabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run = RunContext::new(&config_in(dir.path(), true));
        run.tracker.begin("answer_agent").add_tokens(10, 5);
        run.tracker.end("answer_agent");

        let path = run.finish().expect("persisted").expect("enabled");
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());
    }

    #[test]
    fn finish_without_monitoring_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let save_dir = dir.path().join("perf");
        let run = RunContext::new(&config_in(&save_dir, false));
        assert!(run.finish().expect("ok").is_none());
        assert!(!save_dir.exists());
    }
}
