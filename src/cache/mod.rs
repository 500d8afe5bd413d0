//! Cache Module
//!
//! Provides a generic in-memory key-value store with per-entry TTL expiration
//! and eviction callbacks.

mod entry;
mod options;
mod snapshot;
mod stats;
mod store;


// Re-export public types
pub use entry::{EntryState, Ttl};
pub use options::{CacheOptions, ExpiredCallback, SupersedePolicy, DEFAULT_TTL_SECS};
pub use snapshot::Snapshot;
pub use stats::CacheStats;
pub use store::TtlCache;
