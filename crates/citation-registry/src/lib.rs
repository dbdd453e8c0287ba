//! Citation-Registry: run-scoped citation numbering
//!
//! Hands out display identifiers `[1]`, `[2]`, ... for knowledge items cited
//! in a generated answer. Within one reset-to-reset interval the allocated ids
//! are exactly `[1]..=[counter]`: contiguous, increasing, never reused.
//!
//! A registry belongs to one run. Construct one per session and pass it down
//! the call chain; nothing here is process-global.
//!
//! ```rust
//! use citation_registry::{CitationRegistry, NewCitation};
//!
//! let registry = CitationRegistry::new();
//! let first = registry.allocate("kb-item-7");
//! let second = registry.allocate(NewCitation::new("kb-item-7").source("lecture_03.pdf"));
//! assert_eq!(first.to_string(), "[1]");
//! assert_eq!(second.to_string(), "[2]");
//! ```

mod error;
mod id;
mod registry;

pub use error::CitationIdError;
pub use id::CitationId;
pub use registry::{CitationRecord, CitationRegistry, NewCitation};
