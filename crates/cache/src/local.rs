//! In-process tier of the result cache.
//!
//! Keys are content hashes, so an entry never goes stale by being
//! overwritten with different data; it only ages out. Reads enforce the TTL
//! themselves. A full cache first drops expired entries, then the least
//! recently read one, so a new result is always admitted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct StoredResult {
    payload: String,
    stored_at: Instant,
    last_read: u64,
}

pub struct LocalCache {
    entries: DashMap<String, StoredResult>,
    ttl: Duration,
    capacity: usize,
    /// Logical clock for recency; bumped on every read and write.
    clock: AtomicU64,
}

impl LocalCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity.min(1024)),
            ttl,
            capacity,
            clock: AtomicU64::new(0),
        }
    }

    /// Serialized result for `key`, if present and younger than the TTL.
    /// An expired entry is dropped on the spot.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entry = self.entries.get_mut(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            drop(entry);
            self.entries
                .remove_if(key, |_, e| e.stored_at.elapsed() > self.ttl);
            return None;
        }
        entry.last_read = self.tick();
        Some(entry.payload.clone())
    }

    /// Store a result, returning how many entries were evicted to make room.
    /// Overwriting an existing key never evicts.
    pub fn put(&self, key: String, payload: String) -> usize {
        if self.capacity == 0 {
            return 0;
        }

        let mut evicted = 0;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            evicted += self.evict_expired();
            // Concurrent writers can overshoot briefly; each pass removes one.
            while self.entries.len() >= self.capacity {
                let Some(victim) = self.least_recently_read() else {
                    break;
                };
                if self.entries.remove(&victim).is_some() {
                    evicted += 1;
                }
            }
        }

        let last_read = self.tick();
        self.entries.insert(
            key,
            StoredResult {
                payload,
                stored_at: Instant::now(),
                last_read,
            },
        );
        evicted
    }

    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.stored_at.elapsed() <= self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn least_recently_read(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|e| e.last_read)
            .map(|e| e.key().clone())
    }
}
