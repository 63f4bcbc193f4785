//! Counter storage behind the limiter.
//!
//! The limiter's only correctness requirement on a store is that
//! [`CounterStore::increment_below`] is atomic per [`CounterKey`]: two
//! concurrent callers at `max - 1` must not both be counted.
use dashmap::DashMap;

use crate::error::RateLimitError;

/// Identity of one counter: endpoint class, caller, and window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub namespace: String,
    pub key: String,
    /// Window start, milliseconds since the Unix epoch.
    pub window_start_ms: i64,
}

/// Result of an atomic increment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Increment {
    /// Counted; the value is the count after incrementing.
    Counted(u32),
    /// Already at the limit; the value is the unchanged count.
    Full(u32),
}

/// Storage for fixed-window counters.
pub trait CounterStore: Send + Sync {
    /// Increments the counter if it is below `max`, atomically.
    fn increment_below(&self, key: &CounterKey, max: u32) -> Result<Increment, RateLimitError>;

    /// Removes counters in `namespace` whose window started before
    /// `active_window_start_ms`. Returns how many were removed.
    fn purge_expired(
        &self,
        namespace: &str,
        active_window_start_ms: i64,
    ) -> Result<usize, RateLimitError>;
}

/// In-process store on a sharded map; each entry is locked for the
/// duration of its read-then-increment.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<CounterKey, u32>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl CounterStore for MemoryCounterStore {
    fn increment_below(&self, key: &CounterKey, max: u32) -> Result<Increment, RateLimitError> {
        let mut count = self.counters.entry(key.clone()).or_insert(0);
        if *count >= max {
            return Ok(Increment::Full(*count));
        }
        *count += 1;
        Ok(Increment::Counted(*count))
    }

    fn purge_expired(
        &self,
        namespace: &str,
        active_window_start_ms: i64,
    ) -> Result<usize, RateLimitError> {
        let before = self.counters.len();
        self.counters.retain(|k, _| {
            k.namespace != namespace || k.window_start_ms >= active_window_start_ms
        });
        Ok(before.saturating_sub(self.counters.len()))
    }
}
