//! Cache Options Module
//!
//! Construction-time settings for a [`TtlCache`](crate::cache::TtlCache).

use std::fmt;
use std::sync::Arc;

use crate::cache::Ttl;

/// TTL in seconds used when [`CacheOptions::default`] is not overridden.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Callback invoked with the key and value of an entry evicted by its timer.
pub type ExpiredCallback<K, V> = Arc<dyn Fn(K, V) + Send + Sync + 'static>;

// == Supersede Policy ==
/// What happens to the pending timer of a key that is inserted again or removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SupersedePolicy {
    /// Abort the previous timer; only the timer of the installed insertion may evict it.
    #[default]
    ReplaceTimer,
    /// Leave every timer running. Whichever fires first evicts the key, even if
    /// the key now holds a newer value.
    KeepStaleTimers,
}

impl SupersedePolicy {
    /// Whether a timer started for `firing` may evict the insertion `installed`.
    pub(crate) fn may_evict(self, installed: u64, firing: u64) -> bool {
        match self {
            SupersedePolicy::ReplaceTimer => installed == firing,
            SupersedePolicy::KeepStaleTimers => true,
        }
    }

    pub(crate) fn cancels_timers(self) -> bool {
        matches!(self, SupersedePolicy::ReplaceTimer)
    }
}

// == Cache Options ==
/// Settings accepted by [`TtlCache::new`](crate::cache::TtlCache::new).
///
/// ```ignore
/// let options = CacheOptions::default()
///     .with_default_ttl(60)
///     .with_on_expired(|key: String, value: String| println!("{key} -> {value} expired"));
/// let cache = TtlCache::new(options)?;
/// ```
pub struct CacheOptions<K, V> {
    pub(crate) default_ttl: Ttl,
    pub(crate) on_expired: Option<ExpiredCallback<K, V>>,
    pub(crate) supersede: SupersedePolicy,
}

impl<K, V> CacheOptions<K, V> {
    /// TTL applied by [`TtlCache::insert`](crate::cache::TtlCache::insert).
    /// Zero or negative disables expiry for those insertions.
    pub fn with_default_ttl(mut self, secs: i64) -> Self {
        self.default_ttl = Ttl::from_secs(secs);
        self
    }

    /// Registers the eviction callback. It runs on a runtime worker, before the
    /// entry is structurally removed.
    pub fn with_on_expired<F>(mut self, callback: F) -> Self
    where
        F: Fn(K, V) + Send + Sync + 'static,
    {
        self.on_expired = Some(Arc::new(callback));
        self
    }

    pub fn with_supersede_policy(mut self, policy: SupersedePolicy) -> Self {
        self.supersede = policy;
        self
    }

    pub fn default_ttl(&self) -> Ttl {
        self.default_ttl
    }

    pub fn supersede_policy(&self) -> SupersedePolicy {
        self.supersede
    }
}

impl<K, V> Default for CacheOptions<K, V> {
    fn default() -> Self {
        Self {
            default_ttl: Ttl::from_secs(DEFAULT_TTL_SECS),
            on_expired: None,
            supersede: SupersedePolicy::default(),
        }
    }
}

impl<K, V> fmt::Debug for CacheOptions<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("default_ttl", &self.default_ttl)
            .field("on_expired", &self.on_expired.is_some())
            .field("supersede", &self.supersede)
            .finish()
    }
}
