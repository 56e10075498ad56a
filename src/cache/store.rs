//! Cache Store Module
//!
//! Single-owner cache engine: HashMap storage, TTL expiry and nearest-expiry
//! eviction. Time is always passed in, so the store itself never reads a clock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::cache::{CacheEntry, CacheStats, StatsCounters};
use crate::config::CacheConfig;
use crate::error::{Error, Result};

// == Lookup ==
/// Result of a non-mutating lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a, V> {
    Hit(&'a V),
    Missing,
    /// Present but past its expiry; the caller decides when to purge
    Expired,
}

// == Cache Store ==
/// Cache storage with TTL and nearest-expiry eviction.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: StatsCounters,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Lifetime given to every write
    ttl: Duration,
}

impl<V> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore, rejecting a zero capacity or zero TTL.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entries: HashMap::new(),
            stats: StatsCounters::new(),
            max_entries: config.max_entries,
            ttl: config.ttl,
        })
    }

    // == Set ==
    /// Stores a value under `key` with the configured TTL.
    ///
    /// A full store first evicts the entry closest to expiry, whether or not
    /// `key` is already present. An existing key is then replaced in place.
    /// Returns the evicted key, if any.
    pub fn set(&mut self, key: &str, value: V, now: Instant) -> Result<Option<String>> {
        validate_key(key)?;

        let mut evicted = None;
        if self.entries.len() >= self.max_entries {
            evicted = self.evict_nearest_expiry();
        }

        self.entries
            .insert(key.to_string(), CacheEntry::new(value, now, self.ttl));

        Ok(evicted)
    }

    // == Lookup ==
    /// Reads without purging. Records a hit or a miss.
    pub fn lookup(&self, key: &str, now: Instant) -> Lookup<'_, V> {
        if key.trim().is_empty() {
            self.stats.record_miss();
            return Lookup::Missing;
        }

        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                self.stats.record_miss();
                Lookup::Expired
            }
            Some(entry) => {
                self.stats.record_hit();
                Lookup::Hit(&entry.value)
            }
            None => {
                self.stats.record_miss();
                Lookup::Missing
            }
        }
    }

    // == Get ==
    /// Retrieves a value, purging it if it turns out to be expired.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<V>
    where
        V: Clone,
    {
        match self.lookup(key, now) {
            Lookup::Hit(value) => Some(value.clone()),
            Lookup::Missing => None,
            Lookup::Expired => {
                self.purge_if_expired(key, now);
                None
            }
        }
    }

    // == Purge If Expired ==
    /// Removes `key` only if it is still present and expired at `now`.
    ///
    /// Returns true if an entry was removed.
    pub fn purge_if_expired(&mut self, key: &str, now: Instant) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(now));
        if expired {
            self.entries.remove(key);
            self.stats.record_expirations(1);
        }
        expired
    }

    // == Remove ==
    /// Removes an entry by key. Removing an absent key is a no-op.
    ///
    /// Returns true if an entry was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Clear ==
    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == Purge Expired ==
    /// Removes all expired entries, returning their keys.
    pub fn purge_expired(&mut self, now: Instant) -> Vec<String> {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
        }

        self.stats.record_expirations(expired_keys.len() as u64);
        expired_keys
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len())
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // Ties on expires_at resolve to whichever the map yields first.
    fn evict_nearest_expiry(&mut self) -> Option<String> {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone())?;

        self.entries.remove(&victim);
        self.stats.record_eviction();
        Some(victim)
    }
}

/// Rejects empty and whitespace-only keys.
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::InvalidKey);
    }
    Ok(())
}
