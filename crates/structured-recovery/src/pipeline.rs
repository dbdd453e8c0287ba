//! The tiered recovery pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::repair::{LenientRepair, Repair};
use crate::tiers::{parse_structured, Input, Tier, STRUCTURAL_TIERS};

/// Characters of input echoed into debug logs when recovery fails.
const PREVIEW_CHARS: usize = 200;

/// Result of running the pipeline. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// A tier produced an object or array.
    Parsed { value: Value, tier: Tier },
    /// Every tier failed; `value` is the caller's fallback.
    Fallback { value: Value },
}

impl ParseOutcome {
    pub fn value(&self) -> &Value {
        match self {
            ParseOutcome::Parsed { value, .. } | ParseOutcome::Fallback { value } => value,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            ParseOutcome::Parsed { value, .. } | ParseOutcome::Fallback { value } => value,
        }
    }

    /// Tier that succeeded, `None` for a fallback.
    pub fn tier(&self) -> Option<Tier> {
        match self {
            ParseOutcome::Parsed { tier, .. } => Some(*tier),
            ParseOutcome::Fallback { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParseOutcome::Fallback { .. })
    }
}

/// Configuration for [`RecoveryPipeline::from_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Enable the repair tier.
    pub repair: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self { repair: true }
    }
}

/// Turns noisy model output into structured data.
///
/// Tiers run in strict order and stop at the first success:
/// code fence, direct parse, fragment, repair, fallback.
pub struct RecoveryPipeline {
    repairer: Option<Box<dyn Repair>>,
}

impl Default for RecoveryPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RecoveryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryPipeline")
            .field("repair", &self.repairer.is_some())
            .finish()
    }
}

impl RecoveryPipeline {
    /// Pipeline with the built-in [`LenientRepair`] tier.
    pub fn new() -> Self {
        Self::with_repairer(LenientRepair)
    }

    /// Pipeline whose repair tier is unavailable.
    pub fn without_repair() -> Self {
        Self { repairer: None }
    }

    pub fn with_repairer(repairer: impl Repair + 'static) -> Self {
        Self {
            repairer: Some(Box::new(repairer)),
        }
    }

    pub fn from_config(config: &RecoveryConfig) -> Self {
        if config.repair {
            Self::new()
        } else {
            Self::without_repair()
        }
    }

    pub fn has_repair(&self) -> bool {
        self.repairer.is_some()
    }

    /// Recover with an empty object as the fallback.
    pub fn recover(&self, text: &str) -> ParseOutcome {
        self.recover_with(text, Value::Object(Map::new()))
    }

    /// Recover, returning `fallback` when every tier fails. Never errors.
    pub fn recover_with(&self, text: &str, fallback: Value) -> ParseOutcome {
        if text.trim().is_empty() {
            warn!("model returned empty response; using fallback");
            return ParseOutcome::Fallback { value: fallback };
        }

        let input = Input::new(text);
        if input.has_fence() {
            debug!("response contains fenced blocks");
        }

        if let Some((value, tier)) = attempt_structural(&input) {
            debug!(tier = %tier, "recovered structured data");
            return ParseOutcome::Parsed { value, tier };
        }

        match self.attempt_repair(&input) {
            Some(value) => {
                info!(tier = %Tier::Repaired, "repaired malformed structured data");
                ParseOutcome::Parsed {
                    value,
                    tier: Tier::Repaired,
                }
            }
            None => {
                warn!(bytes = text.len(), "all recovery tiers failed; using fallback");
                debug!(preview = %preview(input.repair_target()), "unrecoverable response");
                ParseOutcome::Fallback { value: fallback }
            }
        }
    }

    fn attempt_repair(&self, input: &Input<'_>) -> Option<Value> {
        let Some(repairer) = self.repairer.as_deref() else {
            warn!("no repair capability configured; cannot repair malformed response");
            return None;
        };
        match repairer.repair(input.repair_target()) {
            Ok(repaired) => {
                let value = parse_structured(&repaired);
                if value.is_none() {
                    warn!("repair output still unparseable");
                }
                value
            }
            Err(e) => {
                warn!(error = %e, "repair failed");
                None
            }
        }
    }
}

/// Tiers 1-3 only: no repair, no fallback.
pub fn extract_structured(text: &str) -> Option<(Value, Tier)> {
    if text.trim().is_empty() {
        return None;
    }
    attempt_structural(&Input::new(text))
}

fn attempt_structural(input: &Input<'_>) -> Option<(Value, Tier)> {
    STRUCTURAL_TIERS
        .iter()
        .find_map(|(tier, attempt)| attempt(input).map(|value| (value, *tier)))
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
