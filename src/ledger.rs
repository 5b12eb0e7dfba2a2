//! Pending request ledger.
//!
//! Tracks every caller lookup that the cache could not satisfy immediately.
//! A [`PendingRequest`] lives here until the cache can cover its full
//! coordinate list (resolved) or a terminal failure is attributed to it
//! (failed): exactly one of the two, exactly once. The oneshot sender is
//! consumed on resolution, so double delivery is unrepresentable.

use std::collections::HashSet;

use tokio::sync::oneshot;

use crate::cache::ElevationCache;
use crate::coord::Coordinate;
use crate::error::{CairnError, Result};

/// One caller's still-unsatisfied elevation lookup.
pub(crate) struct PendingRequest {
    /// The caller's coordinate list, in caller order (duplicates kept).
    pub(crate) coords: Vec<Coordinate>,
    tx: oneshot::Sender<Result<Vec<f64>>>,
}

impl PendingRequest {
    pub(crate) fn new(coords: Vec<Coordinate>, tx: oneshot::Sender<Result<Vec<f64>>>) -> Self {
        Self { coords, tx }
    }

    /// Whether any of this request's coordinates appear in `chunk`.
    fn overlaps(&self, chunk: &HashSet<Coordinate>) -> bool {
        self.coords.iter().any(|c| chunk.contains(c))
    }

    fn resolve(self, values: Vec<f64>) {
        // A dropped receiver means the caller stopped awaiting; nothing to do.
        let _ = self.tx.send(Ok(values));
    }

    fn fail(self, err: CairnError) {
        let _ = self.tx.send(Err(err));
    }
}

/// The set of outstanding caller requests not yet satisfied by the cache.
#[derive(Default)]
pub(crate) struct RequestLedger {
    pending: Vec<PendingRequest>,
}

impl RequestLedger {
    pub(crate) fn push(&mut self, request: PendingRequest) {
        self.pending.push(request);
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The working set: every coordinate some pending request still needs
    /// and the cache does not hold, deduplicated, in insertion order of
    /// first appearance. No geographic sorting; the provider has no
    /// locality requirement.
    pub(crate) fn uncached_union(&self, cache: &ElevationCache) -> Vec<Coordinate> {
        let mut seen = HashSet::new();
        let mut union = Vec::new();
        for request in &self.pending {
            for coord in &request.coords {
                if !cache.contains(coord) && seen.insert(*coord) {
                    union.push(*coord);
                }
            }
        }
        union
    }

    /// Working sets of the two halves of the ledger, split by request count.
    ///
    /// Used for 413 recovery: requests are atomic units for callback
    /// delivery, so the split is request-level rather than coordinate-level.
    pub(crate) fn half_unions(&self, cache: &ElevationCache) -> (Vec<Coordinate>, Vec<Coordinate>) {
        let mid = self.pending.len().div_ceil(2);
        let union_of = |requests: &[PendingRequest]| {
            let mut seen = HashSet::new();
            let mut union = Vec::new();
            for request in requests {
                for coord in &request.coords {
                    if !cache.contains(coord) && seen.insert(*coord) {
                        union.push(*coord);
                    }
                }
            }
            union
        };
        (union_of(&self.pending[..mid]), union_of(&self.pending[mid..]))
    }

    /// All coordinates referenced by any pending request. These are
    /// protected from cache eviction.
    pub(crate) fn referenced_coordinates(&self) -> HashSet<Coordinate> {
        self.pending
            .iter()
            .flat_map(|request| request.coords.iter().copied())
            .collect()
    }

    /// Remove and resolve every request whose full coordinate list the
    /// cache now covers. Values are read fresh from the cache, so a request
    /// spanning several chunks (or satisfied partly by an earlier cycle)
    /// sees all of them. Returns the number of requests resolved.
    pub(crate) fn resolve_ready(&mut self, cache: &ElevationCache) -> usize {
        let mut resolved = 0;
        for request in std::mem::take(&mut self.pending) {
            let values: Option<Vec<f64>> = request
                .coords
                .iter()
                .map(|coord| cache.get(coord).map(|entry| entry.elevation))
                .collect();
            match values {
                Some(values) => {
                    request.resolve(values);
                    resolved += 1;
                }
                None => self.pending.push(request),
            }
        }
        resolved
    }

    /// Remove and fail every request whose coordinates overlap `chunk`.
    ///
    /// Requests in unrelated chunks of the same cycle stay queued. Returns
    /// the number of requests failed.
    pub(crate) fn fail_overlapping(&mut self, chunk: &HashSet<Coordinate>, err: &CairnError) -> usize {
        let mut failed = 0;
        for request in std::mem::take(&mut self.pending) {
            if request.overlaps(chunk) {
                request.fail(err.clone());
                failed += 1;
            } else {
                self.pending.push(request);
            }
        }
        failed
    }

    /// Remove and fail every pending request. Used when the transient
    /// failure budget is exhausted. Returns the number of requests failed.
    pub(crate) fn fail_all(&mut self, err: &CairnError) -> usize {
        let failed = self.pending.len();
        for request in std::mem::take(&mut self.pending) {
            request.fail(err.clone());
        }
        failed
    }
}
