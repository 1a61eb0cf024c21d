//! Cache Entry Module
//!
//! Defines the timestamped wrapper around one cached value.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single cached value with its creation and access times.
///
/// Timestamps come from `tokio::time::Instant` so a paused test clock
/// drives expiry the same way real time does.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,
    /// When the entry was inserted
    pub entered_at: Instant,
    /// When the entry was last returned by a lookup
    pub last_used_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(value: V) -> Self {
        let now = Instant::now();
        Self {
            value,
            entered_at: now,
            last_used_at: now,
        }
    }

    // == Touch ==
    /// Marks the entry as used now.
    pub fn touch(&mut self) {
        let now = Instant::now();
        if now > self.last_used_at {
            self.last_used_at = now;
        }
    }

    // == Expiry Checks ==
    /// Returns true once the entry has been idle for at least `expire`.
    ///
    /// A zero duration disables the check.
    pub fn is_expired(&self, now: Instant, expire: Duration) -> bool {
        !expire.is_zero() && now.saturating_duration_since(self.last_used_at) >= expire
    }

    /// Returns true once the entry is at least `refresh` old, regardless of use.
    ///
    /// A zero duration disables the check.
    pub fn needs_refresh(&self, now: Instant, refresh: Duration) -> bool {
        !refresh.is_zero() && now.saturating_duration_since(self.entered_at) >= refresh
    }

    /// Consumes the entry, returning the cached value.
    pub fn into_value(self) -> V {
        self.value
    }
}
