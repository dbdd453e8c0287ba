use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::id::CitationId;

/// One allocated citation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRecord {
    pub citation_id: CitationId,
    /// Knowledge item being cited
    pub knowledge_id: String,
    /// Reference marker carried by the knowledge item itself (e.g. "[3]")
    pub reference_id: Option<String>,
    pub source: Option<String>,
    pub content: Option<String>,
}

/// Arguments for [`CitationRegistry::allocate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCitation {
    pub knowledge_id: String,
    pub reference_id: Option<String>,
    pub source: Option<String>,
    pub content: Option<String>,
}

impl NewCitation {
    pub fn new(knowledge_id: impl Into<String>) -> Self {
        Self {
            knowledge_id: knowledge_id.into(),
            ..Self::default()
        }
    }

    pub fn reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

impl From<&str> for NewCitation {
    fn from(knowledge_id: &str) -> Self {
        Self::new(knowledge_id)
    }
}

impl From<String> for NewCitation {
    fn from(knowledge_id: String) -> Self {
        Self::new(knowledge_id)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    counter: u64,
    records: BTreeMap<CitationId, CitationRecord>,
}

/// Allocates and looks up citation ids for a single run.
///
/// Allocation is serialized by an internal mutex, so concurrent callers on one
/// registry never observe the same counter value.
#[derive(Debug, Default)]
pub struct CitationRegistry {
    state: Mutex<RegistryState>,
}

impl CitationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        // The state is always left consistent, so a panic elsewhere
        // must not stop numbering.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a brand-new id. Never deduplicates by knowledge id: the same
    /// item cited twice gets two ids.
    pub fn allocate(&self, citation: impl Into<NewCitation>) -> CitationId {
        let citation = citation.into();
        let mut state = self.state();
        state.counter += 1;
        let citation_id = CitationId::new(state.counter);

        debug!(
            citation_id = %citation_id,
            knowledge_id = %citation.knowledge_id,
            "allocated citation"
        );
        state.records.insert(
            citation_id,
            CitationRecord {
                citation_id,
                knowledge_id: citation.knowledge_id,
                reference_id: citation.reference_id,
                source: citation.source,
                content: citation.content,
            },
        );
        citation_id
    }

    /// Look up a record by its display form, e.g. `"[2]"`.
    pub fn lookup(&self, citation_id: &str) -> Option<CitationRecord> {
        let id = citation_id.parse::<CitationId>().ok()?;
        self.get(id)
    }

    pub fn get(&self, citation_id: CitationId) -> Option<CitationRecord> {
        self.state().records.get(&citation_id).cloned()
    }

    /// Snapshot of every record, ordered by id.
    pub fn all(&self) -> BTreeMap<CitationId, CitationRecord> {
        self.state().records.clone()
    }

    /// Number of ids allocated since the last reset.
    pub fn counter(&self) -> u64 {
        self.state().counter
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().records.is_empty()
    }

    /// Start a new run: numbering restarts at `[1]`.
    pub fn reset(&self) {
        let mut state = self.state();
        let dropped = state.counter;
        *state = RegistryState::default();
        debug!(dropped, "citation registry reset");
    }
}
