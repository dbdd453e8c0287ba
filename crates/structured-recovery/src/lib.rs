//! Structured-Recovery: turning noisy LLM output into validated JSON
//!
//! Model completions rarely arrive as clean JSON. This crate recovers
//! structured data by trying tiers in a fixed order and stopping at the first
//! that yields an object or array:
//!
//! 1. **Code fence**: the content of the first ```` ```json ```` block
//! 2. **Direct**: the whole input as-is
//! 3. **Fragment**: the first `{...}` span, then the first `[...]` span
//! 4. **Repair**: a pluggable [`Repair`] capability, then reparse
//! 5. **Fallback**: the caller's value (default `{}`), logged at `warn`
//!
//! Recovery never errors. The validation helpers in [`validate`] are the
//! opposite: strict, and they return a typed [`ValidationError`].
//!
//! ```rust
//! use structured_recovery::{recover, Tier};
//!
//! let outcome = recover("Here it is:\n```json\n{\"steps\": [1, 2]}\n```");
//! assert_eq!(outcome.tier(), Some(Tier::CodeBlock));
//! ```

use std::sync::OnceLock;

use serde_json::Value;

mod error;
mod pipeline;
mod repair;
mod text;
mod tiers;
pub mod validate;

pub use error::{RepairError, ValidationError, ValidationResult};
pub use pipeline::{extract_structured, ParseOutcome, RecoveryConfig, RecoveryPipeline};
pub use repair::{LenientRepair, Repair};
pub use text::{safe_loads, to_pretty_text};
pub use tiers::{extract_fenced, Tier};
pub use validate::{require_array, require_keys, require_object};

fn default_pipeline() -> &'static RecoveryPipeline {
    static PIPELINE: OnceLock<RecoveryPipeline> = OnceLock::new();
    PIPELINE.get_or_init(RecoveryPipeline::new)
}

/// Recover with the default pipeline and an empty-object fallback.
pub fn recover(text: &str) -> ParseOutcome {
    default_pipeline().recover(text)
}

/// Recover with the default pipeline and a caller-supplied fallback.
pub fn recover_with(text: &str, fallback: Value) -> ParseOutcome {
    default_pipeline().recover_with(text, fallback)
}
