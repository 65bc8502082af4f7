use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<T> {
    value: T,
    fetched_at: Instant,
}

/// Single-slot cache for an upstream index
///
/// Values younger than the TTL are fresh. Older values are kept so a failed
/// refresh can still serve the last good listing.
#[derive(Debug)]
pub struct IndexCache<T> {
    ttl: Duration,
    slot: Mutex<Option<Entry<T>>>,
}

impl<T: Clone> IndexCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn fresh(&self) -> Option<T> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.value.clone())
    }

    /// Last stored value regardless of age
    pub fn stale(&self) -> Option<T> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(|e| e.value.clone())
    }

    pub fn store(&self, value: T) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Entry {
            value,
            fetched_at: Instant::now(),
        });
    }
}
