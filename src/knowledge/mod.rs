//! Knowledge layer backing review context and validation.
//!
//! Entries are categorized (patterns, preferences, gotchas, solutions,
//! corrections), prioritized, and persisted one JSON collection per
//! category. Recall is relevance-ranked and tracked.

mod entry;
mod relevance;
mod store;

pub use entry::*;
pub use relevance::*;
pub use store::*;
