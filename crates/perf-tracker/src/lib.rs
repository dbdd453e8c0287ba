//! Perf-Tracker: span-based telemetry for agent operations
//!
//! A [`PerfTracker`] measures named operations (one LLM call, one agent step)
//! as spans carrying wall-clock duration, token usage, API call and error
//! counts, and arbitrary custom metrics. Closed spans are folded into running
//! totals that can be summarized, logged, or persisted as JSON.
//!
//! Telemetry is observational. Closing an unknown span is a no-op, a disabled
//! tracker does nothing at all, and [`PerfTracker::scope`] returns the
//! operation's result unchanged after recording it.
//!
//! ```rust
//! use perf_tracker::{PerfConfig, PerfTracker};
//!
//! let tracker = PerfTracker::new(PerfConfig::default());
//! let result: Result<u32, String> = tracker.scope_blocking("rag_agent", |span| {
//!     span.add_tokens(120, 40);
//!     span.add_api_call();
//!     Ok(3)
//! });
//! assert_eq!(result, Ok(3));
//! assert_eq!(tracker.summary().total_tokens, 160);
//! ```

mod error;
mod scope;
mod span;
mod tracker;

pub use error::{PerfError, PerfResult};
pub use scope::{wrap, wrap_fn, wrap_traced, SpanGuard, Traced, Tracked};
pub use span::{MetricsSpan, SpanHandle};
pub use tracker::{PerfConfig, PerfSummary, PerfTracker, DEFAULT_SAVE_DIR};
