//! Bounded key-value store with least-recently-used eviction and idle expiry.
//!
//! Two forces bound the store:
//!
//! * capacity: inserting a new key while `len() >= max_size` first evicts the
//!   least-recently-used entry, so the size never exceeds `max_size`;
//! * time-to-live: every `get`/`get_or_create` first sweeps all entries idle
//!   for longer than the TTL. An expired entry is never handed out.
//!
//! Recency is a total order kept by [`LruCache`], not a timestamp comparison,
//! so entries created in the same instant still evict in insertion order.
//! `last_accessed` is bookkeeping owned by the cache and only the cache writes it.
//!
//! The type is not internally synchronized. Share it behind a lock.

use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use std::sync::Arc;

struct Entry<T> {
    value: T,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}

impl<T> Entry<T> {
    fn new(value: T, now: DateTime<Utc>) -> Self {
        Self { value, created_at: now, last_accessed: now }
    }
}

pub struct BoundedTtlCache<T> {
    name: &'static str,
    entries: LruCache<i64, Entry<T>>,
    max_size: usize,
    ttl_hours: u64,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T> BoundedTtlCache<T> {
    pub fn new(name: &'static str, max_size: usize, ttl_hours: u64) -> Self {
        Self::with_clock(name, max_size, ttl_hours, Arc::new(SystemClock))
    }

    /// A `max_size` of zero is treated as one.
    pub fn with_clock(
        name: &'static str,
        max_size: usize,
        ttl_hours: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl = i64::try_from(ttl_hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or_else(|| Duration::days(365 * 1000));
        Self {
            name,
            entries: LruCache::unbounded(),
            max_size: max_size.max(1),
            ttl_hours,
            ttl,
            clock,
        }
    }

    /// Fetch `key`, creating it with `factory` if absent.
    ///
    /// An existing entry is refreshed and becomes most recently used. A new
    /// entry is inserted at the most-recently-used end, after the
    /// least-recently-used entry has been evicted if the cache is full.
    pub fn get_or_create<F>(&mut self, key: i64, factory: F) -> &mut T
    where
        F: FnOnce() -> T,
    {
        let now = self.clock.now();
        self.sweep(now);

        if !self.entries.contains(&key) {
            self.make_room();
            tracing::debug!(cache = self.name, key, size = self.entries.len() + 1, "entry created");
        }

        let entry = self.entries.get_or_insert_mut(key, || Entry::new(factory(), now));
        entry.last_accessed = now;
        &mut entry.value
    }

    /// Fetch `key` without creating it, refreshing and promoting it when present.
    pub fn get(&mut self, key: i64) -> Option<&mut T> {
        let now = self.clock.now();
        self.sweep(now);

        self.entries.get_mut(&key).map(|entry| {
            entry.last_accessed = now;
            &mut entry.value
        })
    }

    /// Read without refreshing or promoting. Expired entries read as absent.
    pub fn peek(&self, key: i64) -> Option<&T> {
        let now = self.clock.now();
        self.entries
            .peek(&key)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| &entry.value)
    }

    pub fn contains(&self, key: i64) -> bool {
        self.peek(key).is_some()
    }

    pub fn remove(&mut self, key: i64) -> Option<T> {
        self.entries.pop(&key).map(|entry| entry.value)
    }

    /// Remove every expired entry now. Returns how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        self.sweep(now)
    }

    pub fn last_accessed(&self, key: i64) -> Option<DateTime<Utc>> {
        self.entries.peek(&key).map(|entry| entry.last_accessed)
    }

    pub fn created_at(&self, key: i64) -> Option<DateTime<Utc>> {
        self.entries.peek(&key).map(|entry| entry.created_at)
    }

    /// Keys from least to most recently used.
    pub fn keys_lru_order(&self) -> Vec<i64> {
        self.entries.iter().rev().map(|(key, _)| *key).collect()
    }

    /// Physically present entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn ttl_hours(&self) -> u64 {
        self.ttl_hours
    }

    fn is_expired(&self, entry: &Entry<T>, now: DateTime<Utc>) -> bool {
        now - entry.last_accessed > self.ttl
    }

    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<i64> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            self.entries.pop(key);
        }
        if !expired.is_empty() {
            tracing::debug!(cache = self.name, expired = expired.len(), "swept idle entries");
        }
        expired.len()
    }

    fn make_room(&mut self) {
        while self.entries.len() >= self.max_size {
            match self.entries.pop_lru() {
                Some((evicted, _)) => {
                    tracing::debug!(cache = self.name, evicted, "evicted least recently used entry");
                }
                None => break,
            }
        }
    }
}

impl<T> std::fmt::Debug for BoundedTtlCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedTtlCache")
            .field("name", &self.name)
            .field("len", &self.entries.len())
            .field("max_size", &self.max_size)
            .field("ttl_hours", &self.ttl_hours)
            .finish()
    }
}
