//! Cache Store Module
//!
//! Key-value map guarded by a single mutex, with one expiration timer per insertion.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, error, trace};

use crate::cache::entry::{Countdown, TimedEntry};
use crate::cache::{
    CacheOptions, CacheStats, EntryState, ExpiredCallback, Snapshot, SupersedePolicy, Ttl,
};
use crate::error::{CacheError, Result};

// == Slot ==
/// What the map holds per key: the bare value plus the bookkeeping of the
/// insertion that installed it.
#[derive(Debug)]
struct Slot<V> {
    value: V,
    generation: u64,
    countdown: Countdown,
    /// Set once the timer fired and the expiry callback was handed the value.
    expiring: bool,
}

#[derive(Debug)]
struct State<K, V> {
    entries: HashMap<K, Slot<V>>,
    stats: CacheStats,
    next_generation: u64,
}

impl<K, V> State<K, V> {
    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn sync_total(&mut self) {
        let len = self.entries.len();
        self.stats.set_total_entries(len);
    }
}

struct Shared<K, V> {
    state: Mutex<State<K, V>>,
    default_ttl: Ttl,
    on_expired: Option<ExpiredCallback<K, V>>,
    supersede: SupersedePolicy,
    runtime: Handle,
}

// == TTL Cache ==
/// Thread-safe key-value store evicting each entry once its TTL has elapsed.
///
/// Cloning is cheap and yields another handle to the same store. Timers only
/// hold a weak reference, so dropping the last handle stops every pending timer.
pub struct TtlCache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
    V: Clone + Send + 'static,
{
    // == Constructor ==
    /// Creates a cache whose timers run on the current tokio runtime.
    ///
    /// Fails with [`CacheError::NoRuntime`] when called outside a runtime context.
    pub fn new(options: CacheOptions<K, V>) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|err| CacheError::NoRuntime(err.to_string()))?;
        Ok(Self::with_handle(options, runtime))
    }

    /// Creates a cache whose timers run on `runtime`. Usable from threads that
    /// are not part of any runtime.
    pub fn with_handle(options: CacheOptions<K, V>, runtime: Handle) -> Self {
        debug!(
            default_ttl = ?options.default_ttl,
            supersede = ?options.supersede,
            has_callback = options.on_expired.is_some(),
            "creating ttl cache"
        );

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    stats: CacheStats::new(),
                    next_generation: 0,
                }),
                default_ttl: options.default_ttl,
                on_expired: options.on_expired,
                supersede: options.supersede,
                runtime,
            }),
        }
    }

    // == Insert ==
    /// Stores `value` under `key` with the default TTL, replacing any previous value.
    pub fn insert(&self, key: K, value: V) {
        self.install(key, value, self.shared.default_ttl);
    }

    /// Stores `value` under `key`, evicting it after `ttl_secs` seconds.
    /// Zero or negative makes the entry permanent.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl_secs: i64) {
        self.install(key, value, Ttl::from_secs(ttl_secs));
    }

    fn install(&self, key: K, value: V, ttl: Ttl) {
        let mut state = self.shared.lock();
        let generation = state.next_generation();

        let weak = Arc::downgrade(&self.shared);
        let countdown = TimedEntry::new(key.clone(), generation, ttl).start(
            &self.shared.runtime,
            move |key, generation| {
                if let Some(shared) = weak.upgrade() {
                    shared.expire(key, generation);
                }
            },
        );

        trace!(?key, generation, ?ttl, "inserting entry");
        let previous = state.entries.insert(
            key,
            Slot {
                value,
                generation,
                countdown,
                expiring: false,
            },
        );

        if let Some(previous) = previous {
            if self.shared.supersede.cancels_timers() {
                previous.countdown.cancel();
            }
        }
        state.sync_total();
    }

    // == Lookup ==
    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.shared.lock();
        let value = state.entries.get(key).map(|slot| slot.value.clone());
        match value {
            Some(_) => state.stats.record_hit(),
            None => state.stats.record_miss(),
        }
        value
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shared.lock().entries.contains_key(key)
    }

    // == Remove ==
    /// Deletes `key` and returns its value.
    ///
    /// Fails with [`CacheError::NotFound`] if the key is absent; the cache is left unchanged.
    /// An entry whose expiry callback is already running counts as absent: its
    /// eviction has begun and the timer finishes removing it.
    pub fn remove(&self, key: &K) -> Result<V> {
        let mut state = self.shared.lock();
        if !state.entries.get(key).is_some_and(|slot| !slot.expiring) {
            trace!(?key, "remove of absent or expiring entry");
            return Err(CacheError::NotFound(format!("{key:?}")));
        }
        let Some(slot) = state.entries.remove(key) else {
            return Err(CacheError::NotFound(format!("{key:?}")));
        };

        if self.shared.supersede.cancels_timers() {
            slot.countdown.cancel();
        }
        state.stats.record_removal();
        state.sync_total();
        trace!(?key, generation = slot.generation, "removed entry");

        Ok(slot.value)
    }

    // == Snapshot ==
    /// Copies the current values. The lock is released before the copy is returned.
    pub fn snapshot(&self) -> Snapshot<V> {
        let values = {
            let state = self.shared.lock();
            state
                .entries
                .values()
                .map(|slot| slot.value.clone())
                .collect()
        };
        Snapshot::new(values)
    }

    // == Time To Live ==
    /// Returns the time left before `key` expires, `None` for a permanent entry.
    pub fn ttl_remaining(&self, key: &K) -> Result<Option<Duration>> {
        let state = self.shared.lock();
        state
            .entries
            .get(key)
            .map(|slot| slot.countdown.remaining())
            .ok_or_else(|| CacheError::NotFound(format!("{key:?}")))
    }

    /// Lifecycle of the timer belonging to the value currently stored under `key`.
    ///
    /// [`EntryState::Fired`] is only seen while the expiry callback for the entry
    /// runs; once it returns the entry is gone or was replaced.
    pub fn entry_state(&self, key: &K) -> Option<EntryState> {
        let state = self.shared.lock();
        state.entries.get(key).map(|slot| {
            if slot.expiring {
                EntryState::Fired
            } else {
                slot.countdown.state()
            }
        })
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut state = self.shared.lock();
        state.sync_total();
        state.stats.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().entries.is_empty()
    }
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
    V: Clone + Send + 'static,
{
    fn lock(&self) -> MutexGuard<'_, State<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Eviction Protocol ==
    /// Runs on the timer task of insertion `generation` once its TTL elapsed.
    fn expire(&self, key: K, generation: u64) {
        let Some(callback) = self.on_expired.as_ref() else {
            let mut state = self.lock();
            if let Some(installed) = self.evictable(&state, &key, generation) {
                Self::evict(&mut state, &key, installed);
            }
            return;
        };

        let (value, installed) = {
            let mut state = self.lock();
            if self.evictable(&state, &key, generation).is_none() {
                return;
            }
            let Some(slot) = state.entries.get_mut(&key) else {
                return;
            };
            if slot.expiring {
                trace!(?key, generation, "eviction already in progress");
                return;
            }
            slot.expiring = true;
            (slot.value.clone(), slot.generation)
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(key.clone(), value)));

        let mut state = self.lock();
        if let Err(payload) = outcome {
            error!(
                ?key,
                reason = panic_message(payload.as_ref()),
                "expiry callback panicked"
            );
            state.stats.record_callback_failure();
        }

        match state.entries.get(&key) {
            Some(slot) if slot.generation == installed => Self::evict(&mut state, &key, installed),
            _ => debug!(?key, "entry replaced during expiry callback, keeping it"),
        }
    }

    /// Generation of the insertion the firing timer may evict, if any.
    fn evictable(&self, state: &State<K, V>, key: &K, generation: u64) -> Option<u64> {
        match state.entries.get(key) {
            Some(slot) if self.supersede.may_evict(slot.generation, generation) => {
                Some(slot.generation)
            }
            Some(_) => {
                trace!(?key, generation, "stale timer fired, entry was superseded");
                None
            }
            None => {
                trace!(?key, generation, "timer fired for absent entry");
                None
            }
        }
    }

    fn evict(state: &mut State<K, V>, key: &K, installed: u64) {
        state.entries.remove(key);
        state.stats.record_expiration();
        state.sync_total();
        debug!(?key, generation = installed, "entry expired");
    }
}

impl<K, V> Drop for Shared<K, V> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for slot in state.entries.values() {
            slot.countdown.cancel();
        }
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len();
        f.debug_struct("TtlCache")
            .field("len", &len)
            .field("default_ttl", &self.shared.default_ttl)
            .field("supersede", &self.shared.supersede)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
