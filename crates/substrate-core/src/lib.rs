//! Substrate Core: run-scoped coordination for multi-agent LLM pipelines
//!
//! Facade over the four component crates plus the ambient pieces every
//! consumer needs:
//!
//! - [`structured_recovery`]: noisy model text to validated JSON
//! - [`citation_registry`]: contiguous `[n]` citation numbering per run
//! - [`perf_tracker`]: span telemetry with totals and JSON persistence
//! - [`progress_hub`]: per-channel progress fan-out
//! - [`SubstrateConfig`]: TOML configuration with env overrides
//! - [`RunContext`]: one run's citations and tracker, created per request
//! - [`init_tracing_from`] and [`obs`]: logging setup and lifecycle events

pub mod config;
pub mod context;
pub mod error;
pub mod obs;
pub mod telemetry;

pub use config::{LoggingConfig, ProgressConfig, SubstrateConfig};
pub use context::{RunContext, Substrate};
pub use error::{ConfigError, Result, SubstrateError};
pub use telemetry::{init_tracing, init_tracing_from};

pub use citation_registry::{self, CitationId, CitationRecord, CitationRegistry, NewCitation};
pub use perf_tracker::{
    self, wrap, wrap_fn, wrap_traced, MetricsSpan, PerfConfig, PerfSummary, PerfTracker,
    SpanHandle, Traced, Tracked,
};
pub use progress_hub::{
    self, channel_sink, BroadcastReport, ChannelSink, HubConfig, ProgressEvent, ProgressHub,
    ProgressSink, SubscriberId,
};
pub use structured_recovery::{
    self, recover, recover_with, require_array, require_keys, require_object, ParseOutcome,
    RecoveryConfig, RecoveryPipeline, Tier,
};
