//! The dispatch cycle: debounce, chunk, dispatch concurrently, resolve,
//! and recover from failures.
//!
//! One job runs at a time per service. Each loop iteration is a cycle:
//! read the working set, optionally wait out the debounce window, re-read
//! (new callers may have joined), fetch every chunk concurrently, write the
//! cache, resolve whichever ledger entries the cache now covers, then evict.
//! Failures route three ways: transient server overload retries the whole
//! pending set with linear backoff, HTTP 413 splits the pending requests in
//! half, and everything else terminally fails the overlapping requests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{Inner, State};
use crate::coord::Coordinate;
use crate::error::CairnError;
use crate::telemetry;

#[derive(Default)]
struct DispatchOutcome {
    /// First transient error seen across this dispatch's chunks.
    transient: Option<CairnError>,
    /// Some chunk came back HTTP 413.
    oversized: bool,
}

/// Body of the scheduler job. Exits only when the ledger is empty, clearing
/// the job slot under the lock so a caller arriving during wind-down spawns
/// a fresh job instead of stranding its request.
pub(super) async fn run(inner: Arc<Inner>) {
    loop {
        // Collecting: when the working set fits in a single chunk, wait for
        // near-simultaneous callers to join the same round-trip. A set
        // already larger than one chunk gains nothing from waiting.
        let union = {
            let state = inner.state.lock().await;
            state.ledger.uncached_union(&state.cache)
        };
        if !union.is_empty() && union.len() <= inner.config.max_coordinates_per_request {
            sleep(inner.config.debounce_delay).await;
        }

        // Re-read the working set; it may have grown during the window.
        let union = {
            let mut state = inner.state.lock().await;
            let union = state.ledger.uncached_union(&state.cache);
            if union.is_empty() {
                // Whatever is still queued is already cache-resolvable.
                let State { cache, ledger, .. } = &mut *state;
                ledger.resolve_ready(cache);
                state.job = None;
                return;
            }
            union
        };

        let outcome = dispatch(&inner, union).await;

        let transient = if outcome.oversized {
            split_pending(&inner).await
        } else {
            outcome.transient
        };

        if let Some(err) = transient {
            backoff_or_fail(&inner, &err).await;
            continue;
        }

        let mut state = inner.state.lock().await;
        if state.ledger.is_empty() {
            state.job = None;
            return;
        }
        // Arrivals during dispatch, or requests whose chunk failed to
        // resolve them. Covered by the next cycle, not failed.
        debug!(
            pending = state.ledger.len(),
            "requests deferred to next dispatch cycle"
        );
    }
}

/// Dispatch one working set as capped chunks, concurrently, then fold the
/// responses back into the cache and the ledger.
async fn dispatch(inner: &Inner, union: Vec<Coordinate>) -> DispatchOutcome {
    if union.is_empty() {
        return DispatchOutcome::default();
    }

    let chunks: Vec<Vec<Coordinate>> = union
        .chunks(inner.config.max_coordinates_per_request)
        .map(<[Coordinate]>::to_vec)
        .collect();
    metrics::counter!(telemetry::CHUNKS_DISPATCHED_TOTAL).increment(chunks.len() as u64);
    debug!(
        provider = inner.provider.name(),
        coordinates = union.len(),
        chunks = chunks.len(),
        "dispatching elevation chunks"
    );

    // The round-trips happen without holding the subsystem lock.
    let results = join_all(chunks.iter().map(|chunk| inner.provider.fetch(chunk))).await;

    let mut outcome = DispatchOutcome::default();
    let mut state = inner.state.lock().await;
    let now = Instant::now();
    let State {
        cache,
        ledger,
        failure_count,
        ..
    } = &mut *state;

    for (chunk, result) in chunks.iter().zip(results) {
        match result {
            Ok(elevations) => {
                for (coord, elevation) in chunk.iter().zip(elevations) {
                    // Null elevations collapse to 0.0. See the accuracy
                    // note on ElevationService::get_elevations.
                    cache.put(*coord, elevation.unwrap_or(0.0), now);
                }
                *failure_count = 0;
            }
            Err(CairnError::PayloadTooLarge) => {
                outcome.oversized = true;
            }
            Err(err) if err.is_transient() => {
                if outcome.transient.is_none() {
                    outcome.transient = Some(err);
                }
            }
            Err(err) => {
                // Connectivity and unrecognized statuses are terminal for
                // this chunk's requests only.
                let chunk_set: HashSet<Coordinate> = chunk.iter().copied().collect();
                let failed = ledger.fail_overlapping(&chunk_set, &err);
                warn!(failed, error = %err, "terminal elevation chunk failure");
            }
        }
    }

    let resolved = ledger.resolve_ready(cache);
    if resolved > 0 {
        debug!(resolved, "delivered elevations to pending requests");
    }
    // Housekeeping after delivery, never on the response path.
    let protected = ledger.referenced_coordinates();
    cache.evict_if_oversize(&protected);

    outcome
}

/// 413 recovery: split the pending requests in half by request count,
/// dispatch the first half, and only on its success the second. The main
/// loop then runs a fresh full cycle for anything still outstanding.
///
/// The split is request-level, not coordinate-level: requests stay atomic
/// units so callback delivery remains all-or-nothing. A half that is itself
/// rejected or transiently failed is returned as a transient error and
/// charged against the failure budget, so a server that rejects everything
/// cannot loop the scheduler forever.
async fn split_pending(inner: &Inner) -> Option<CairnError> {
    warn!("elevation chunk rejected as too large, splitting pending requests");
    let (first, second) = {
        let state = inner.state.lock().await;
        state.ledger.half_unions(&state.cache)
    };

    let outcome = dispatch(inner, first).await;
    if outcome.oversized {
        return Some(CairnError::PayloadTooLarge);
    }
    if outcome.transient.is_some() {
        return outcome.transient;
    }

    let outcome = dispatch(inner, second).await;
    if outcome.oversized {
        return Some(CairnError::PayloadTooLarge);
    }
    outcome.transient
}

/// Transient failure policy: linear backoff up to the configured budget,
/// then fail every pending request and reset the counter.
async fn backoff_or_fail(inner: &Inner, err: &CairnError) {
    let failure_count = {
        let mut state = inner.state.lock().await;
        state.failure_count += 1;
        state.failure_count
    };

    if failure_count < inner.config.max_failed_requests {
        let delay = inner.config.backoff_delay(failure_count, err.retry_after());
        metrics::counter!(telemetry::RETRIES_TOTAL).increment(1);
        warn!(
            failure_count,
            max_failed_requests = inner.config.max_failed_requests,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient elevation failure, retrying pending set"
        );
        sleep(delay).await;
    } else {
        let mut state = inner.state.lock().await;
        let failed = state
            .ledger
            .fail_all(&CairnError::RetriesExhausted {
                attempts: failure_count,
            });
        state.failure_count = 0;
        warn!(
            failed,
            attempts = failure_count,
            "transient failure budget exhausted, failing pending requests"
        );
    }
}
