//! Fixed-window rate limiter keyed by sender identity.
//!
//! Bounds how often any single sender may trigger processing,
//! independently of authorization. Each sender has a window of
//! `window_secs` seconds holding an event counter; when the window
//! elapses, the counter resets before the check. The check-then-record
//! sequence runs under a single write lock, so two concurrent events
//! for the same key can never both slip past the limit.
//!
//! A throttled sender gets at most one notice per window: the first
//! `Throttled` result in a window carries `notify = true`, and the
//! notice itself is not counted by the limiter.
//!
//! Memory is bounded: when more than `max_tracked_keys` senders are
//! tracked, the entry with the stalest window is evicted.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::debug;

/// Default bound on tracked sender keys.
const DEFAULT_MAX_TRACKED_KEYS: usize = 10_000;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Under the limit; the event was recorded.
    Allowed,
    /// Over the limit; the event must be dropped.
    Throttled {
        /// True exactly once per throttled window, for the single
        /// "slow down" notice exempt from the limiter's own accounting.
        notify: bool,
    },
}

/// Per-sender fixed-window state.
struct FixedWindow {
    window_start: Instant,
    count: u32,
    notified: bool,
}

/// Fixed-window rate limiter.
///
/// Thread-safe via `RwLock<HashMap>`; all read-modify-write sequences
/// for a key happen under the write lock.
pub struct RateLimiter {
    windows: RwLock<HashMap<String, FixedWindow>>,
    max_events: u32,
    window: Duration,
    max_tracked_keys: usize,
}

impl RateLimiter {
    /// Create a limiter allowing `max_events` per `window_secs` seconds
    /// per sender. `max_events == 0` disables limiting entirely.
    pub fn new(max_events: u32, window_secs: u64) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            max_events,
            window: Duration::from_secs(window_secs),
            max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
        }
    }

    /// Builder method to bound the number of tracked sender keys.
    pub fn with_max_tracked_keys(mut self, max: usize) -> Self {
        self.max_tracked_keys = max.max(1);
        self
    }

    /// Check whether an event from `key` is allowed, recording it if so.
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// [`check`](Self::check) with an explicit clock, for tests.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        if self.max_events == 0 {
            return RateDecision::Allowed;
        }

        let mut windows = match self.windows.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let entry = windows.entry(key.to_owned()).or_insert(FixedWindow {
            window_start: now,
            count: 0,
            notified: false,
        });

        // Roll the window over before evaluating.
        if now.duration_since(entry.window_start) >= self.window {
            entry.window_start = now;
            entry.count = 0;
            entry.notified = false;
        }

        if entry.count >= self.max_events {
            let notify = !entry.notified;
            entry.notified = true;
            debug!(key, "event throttled");
            return RateDecision::Throttled { notify };
        }

        entry.count += 1;

        if windows.len() > self.max_tracked_keys {
            evict_stalest(&mut windows);
        }

        RateDecision::Allowed
    }

    /// Events recorded for `key` in its current window (0 if elapsed).
    pub fn count(&self, key: &str) -> u32 {
        self.count_at(key, Instant::now())
    }

    /// [`count`](Self::count) with an explicit clock, for tests.
    pub fn count_at(&self, key: &str, now: Instant) -> u32 {
        let windows = match self.windows.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        windows.get(key).map_or(0, |entry| {
            if now.duration_since(entry.window_start) >= self.window {
                0
            } else {
                entry.count
            }
        })
    }

    /// Number of tracked sender keys.
    pub fn tracked_keys(&self) -> usize {
        match self.windows.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Remove the entry whose window started longest ago.
fn evict_stalest(windows: &mut HashMap<String, FixedWindow>) {
    let stalest = windows
        .iter()
        .min_by_key(|(_, entry)| entry.window_start)
        .map(|(key, _)| key.clone());
    if let Some(key) = stalest {
        windows.remove(&key);
    }
}
