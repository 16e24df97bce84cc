//! # deckscope-core
//!
//! Core types, traits, and pure review logic for deckscope.
//!
//! This crate provides the data model, the backend traits, and the pieces of
//! the review engine that need no I/O: visibility, scope filtering and counts,
//! the review session cursor, search, and the in-memory catalog.

pub mod catalog;
pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod scope;
pub mod search;
pub mod session;
pub mod test_fixtures;
pub mod traits;
pub mod visibility;

// Re-export commonly used types at crate root
pub use catalog::{Catalog, PickerCounts, Taxonomy, UsageCounts};
pub use error::{Error, Result};
pub use events::{IdentityBus, IdentityEvent};
pub use models::*;
pub use scope::{
    counts, in_base_scope, in_scope, ChapterScope, ScopeCounts, ScopePatch, ScopeState, TopicScope,
};
pub use search::{search, CardQuery};
pub use session::{PoolOrigin, ReviewSession};
pub use traits::*;
pub use visibility::{is_public, visible};
