//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;

use crate::cache::{CacheOptions, SupersedePolicy, DEFAULT_TTL_SECS};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default TTL in seconds for entries without explicit TTL (<= 0 disables expiry)
    pub default_ttl: i64,
    /// HTTP server port
    pub server_port: u16,
    /// Keep the timers of overwritten entries running instead of replacing them
    pub keep_stale_timers: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `KEEP_STALE_TIMERS` - `true`/`1` to keep superseded timers (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: env::var("DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            keep_stale_timers: env::var("KEEP_STALE_TIMERS")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.keep_stale_timers),
        }
    }

    pub fn supersede_policy(&self) -> SupersedePolicy {
        if self.keep_stale_timers {
            SupersedePolicy::KeepStaleTimers
        } else {
            SupersedePolicy::ReplaceTimer
        }
    }

    /// Cache options derived from this configuration, without a callback.
    pub fn cache_options<K, V>(&self) -> CacheOptions<K, V> {
        CacheOptions::default()
            .with_default_ttl(self.default_ttl)
            .with_supersede_policy(self.supersede_policy())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL_SECS,
            server_port: 3000,
            keep_stale_timers: false,
        }
    }
}
