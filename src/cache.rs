//! Bounded in-memory elevation cache.
//!
//! Maps a [`Coordinate`] to its last fetched elevation plus a write
//! timestamp. The cache is a plain map with an explicitly invoked eviction
//! pass rather than an LRU structure: eviction sorts by write time and must
//! skip coordinates still referenced by pending requests, which off-the-shelf
//! LRU caches cannot express. The eviction pass is O(n log n) and runs after
//! responses have been delivered, never on the per-write hot path.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::debug;

use crate::coord::Coordinate;
use crate::telemetry;

/// A cached elevation and the moment it was written.
///
/// Entries are overwritten, never versioned; `written_at` exists only to
/// order eviction.
#[derive(Debug, Clone, Copy)]
pub struct CacheEntry {
    /// Elevation in metres as reported by the provider (`0.0` may mean
    /// "no data" — see [`ElevationService::get_elevations`](crate::ElevationService::get_elevations)).
    pub elevation: f64,
    /// When this entry was written.
    pub written_at: Instant,
}

/// Bounded mapping from coordinate to elevation.
#[derive(Debug)]
pub struct ElevationCache {
    entries: HashMap<Coordinate, CacheEntry>,
    max_entries: usize,
}

impl ElevationCache {
    /// Create an empty cache that `evict_if_oversize` trims to `max_entries`.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
        }
    }

    /// Look up a cached entry. No side effects.
    pub fn get(&self, coord: &Coordinate) -> Option<&CacheEntry> {
        self.entries.get(coord)
    }

    /// Whether an elevation is cached for `coord`.
    pub fn contains(&self, coord: &Coordinate) -> bool {
        self.entries.contains_key(coord)
    }

    /// Insert or overwrite an entry.
    ///
    /// Does not evict; call [`evict_if_oversize`](Self::evict_if_oversize)
    /// separately once a batch of writes has been delivered to callers.
    pub fn put(&mut self, coord: Coordinate, elevation: f64, now: Instant) {
        self.entries.insert(
            coord,
            CacheEntry {
                elevation,
                written_at: now,
            },
        );
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Trim the cache back to its capacity, oldest writes first.
    ///
    /// Coordinates in `protected` are never evicted even when they are the
    /// oldest; they belong to requests still in the ledger and evicting
    /// them would re-fetch data the scheduler is about to hand out. Returns
    /// the number of entries removed.
    pub fn evict_if_oversize(&mut self, protected: &HashSet<Coordinate>) -> usize {
        if self.entries.len() <= self.max_entries {
            return 0;
        }

        let mut by_age: Vec<(Coordinate, Instant)> = self
            .entries
            .iter()
            .filter(|(coord, _)| !protected.contains(coord))
            .map(|(coord, entry)| (*coord, entry.written_at))
            .collect();
        by_age.sort_by_key(|(_, written_at)| *written_at);

        let excess = self.entries.len() - self.max_entries;
        let mut evicted = 0;
        for (coord, _) in by_age.into_iter().take(excess) {
            self.entries.remove(&coord);
            evicted += 1;
        }

        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "evicted oldest cache entries");
            metrics::counter!(telemetry::EVICTIONS_TOTAL).increment(evicted as u64);
        }
        evicted
    }
}
