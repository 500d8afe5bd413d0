//! Timed Entry Module
//!
//! Binds one insertion to a one-shot expiration countdown running on the tokio runtime.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

// == Time To Live ==
/// Lifetime of a single insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The entry is never evicted by a timer
    Never,
    /// The entry is evicted once this duration has elapsed
    After(Duration),
}

impl Ttl {
    /// Builds a TTL from a number of seconds. Zero or negative means [`Ttl::Never`].
    pub fn from_secs(secs: i64) -> Self {
        if secs <= 0 {
            Ttl::Never
        } else {
            Ttl::After(Duration::from_secs(secs.unsigned_abs()))
        }
    }

    /// Returns true if no timer is started for this TTL.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Ttl::Never)
    }
}

// == Entry State ==
/// Observable lifecycle of a timed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Countdown running
    Scheduled,
    /// Countdown elapsed and the eviction protocol is running (terminal).
    /// A store reports it only while the expiry callback for the entry runs.
    Fired,
    /// No countdown was ever started (terminal)
    Permanent,
}

// == Timed Entry ==
/// The scheduling unit behind one insertion.
///
/// The entry is moved into its timer task and consumed when it fires, so the
/// expiration signal can be delivered at most once.
#[derive(Debug)]
pub(crate) struct TimedEntry<K> {
    key: K,
    generation: u64,
    ttl: Ttl,
}

impl<K: Send + 'static> TimedEntry<K> {
    pub(crate) fn new(key: K, generation: u64, ttl: Ttl) -> Self {
        Self {
            key,
            generation,
            ttl,
        }
    }

    // == Start ==
    /// Starts the countdown on `runtime`. `on_fire` receives the key and the
    /// generation of the insertion once the TTL elapses.
    pub(crate) fn start<F>(self, runtime: &Handle, on_fire: F) -> Countdown
    where
        F: FnOnce(K, u64) + Send + 'static,
    {
        let ttl = match self.ttl {
            Ttl::Never => {
                trace!(generation = self.generation, "permanent entry, no timer started");
                return Countdown::Permanent;
            }
            Ttl::After(ttl) => ttl,
        };

        // a deadline past what the clock can represent is never reached
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            debug!(
                generation = self.generation,
                ?ttl,
                "ttl overflows the clock, treating entry as permanent"
            );
            return Countdown::Permanent;
        };
        let task = runtime.spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            self.fire(on_fire);
        });

        Countdown::Scheduled {
            expires_at,
            abort: task.abort_handle(),
        }
    }

    fn fire<F>(self, on_fire: F)
    where
        F: FnOnce(K, u64),
    {
        trace!(generation = self.generation, "entry timer fired");
        on_fire(self.key, self.generation);
    }
}

// == Countdown ==
/// Handle kept by the store for the timer of the currently installed insertion.
#[derive(Debug)]
pub(crate) enum Countdown {
    Permanent,
    Scheduled {
        expires_at: Instant,
        abort: AbortHandle,
    },
}

impl Countdown {
    /// Stops the pending timer. Firing afterwards is still harmless because the
    /// eviction protocol re-checks the installed generation.
    pub(crate) fn cancel(&self) {
        if let Countdown::Scheduled { abort, .. } = self {
            abort.abort();
        }
    }

    pub(crate) fn state(&self) -> EntryState {
        match self {
            Countdown::Permanent => EntryState::Permanent,
            Countdown::Scheduled { abort, .. } if abort.is_finished() => EntryState::Fired,
            Countdown::Scheduled { .. } => EntryState::Scheduled,
        }
    }

    /// Time left before the timer fires, `None` for permanent entries.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        match self {
            Countdown::Permanent => None,
            Countdown::Scheduled { expires_at, .. } => {
                Some(expires_at.saturating_duration_since(Instant::now()))
            }
        }
    }
}
