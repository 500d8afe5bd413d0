//! TTL Cache - A generic in-memory key-value store with per-entry expiration
//!
//! Every insertion schedules its own one-shot timer; when it fires the entry is
//! evicted and an optional callback is notified.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;

pub use api::AppState;
pub use cache::{CacheOptions, SupersedePolicy, TtlCache};
pub use config::Config;
pub use error::CacheError;
