//! The elevation service: inbound API, shared state, and single-flight
//! scheduling.
//!
//! One [`ElevationService`] instance owns the whole subsystem (cache,
//! pending request ledger, and failure counter) behind a single coarse
//! lock. Contention is low (callers are infrequent relative to lock hold
//! time), and the scheduler's "read the working set, then decide" sequences
//! must not interleave, so there is no per-coordinate locking. Network I/O
//! and all sleeps happen outside the lock.

mod scheduler;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::ElevationCache;
use crate::config::ElevationConfig;
use crate::coord::Coordinate;
use crate::error::{CairnError, Result};
use crate::ledger::{PendingRequest, RequestLedger};
use crate::provider::ElevationProvider;
use crate::telemetry;

/// Shared mutable state, guarded by the subsystem lock.
struct State {
    cache: ElevationCache,
    ledger: RequestLedger,
    /// Consecutive transient failures across the whole subsystem. Reset by
    /// any successful chunk response.
    failure_count: u32,
    /// The running dispatch job, if any. Single-flight is decided by this
    /// handle's completion state; the job clears it under the lock before
    /// exiting so a caller arriving in the wind-down gap still spawns.
    job: Option<JoinHandle<()>>,
}

struct Inner {
    provider: Arc<dyn ElevationProvider>,
    config: ElevationConfig,
    state: Mutex<State>,
}

/// Batching, caching front-end for elevation lookups.
///
/// Clones share the same cache, ledger, and scheduler.
///
/// ```rust,no_run
/// use cairn::{Coordinate, ElevationService, provider::HttpElevationProvider};
/// use std::sync::Arc;
///
/// # async fn example() -> cairn::Result<()> {
/// let service = ElevationService::new(Arc::new(HttpElevationProvider::new()?));
/// let elevations = service
///     .get_elevations(vec![Coordinate::new(46.537, 7.962)])
///     .await?;
/// println!("{} m", elevations[0]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ElevationService {
    inner: Arc<Inner>,
}

impl ElevationService {
    /// Create a service with the default configuration.
    pub fn new(provider: Arc<dyn ElevationProvider>) -> Self {
        Self::with_config(provider, ElevationConfig::default())
    }

    /// Create a service with a custom configuration.
    pub fn with_config(provider: Arc<dyn ElevationProvider>, config: ElevationConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                state: Mutex::new(State {
                    cache: ElevationCache::with_max_entries(config.max_cache_entries),
                    ledger: RequestLedger::default(),
                    failure_count: 0,
                    job: None,
                }),
                config,
            }),
        }
    }

    /// Look up elevations for `coords`, index-aligned with the input.
    ///
    /// Coordinates already cached resolve without network traffic; the rest
    /// join the next dispatch cycle, shared with any other caller whose
    /// lookup overlaps. Duplicates within the input each resolve
    /// independently even though they are fetched at most once. An empty
    /// input resolves immediately with an empty vec.
    ///
    /// The future completes exactly once: `Ok` only when every coordinate
    /// resolved, `Err` when a terminal failure was attributed to this
    /// request. There is no partial success.
    ///
    /// Note: the provider reports "no data" as null, which this service
    /// stores as `0.0` rather than surfacing per-coordinate errors. A
    /// returned `0.0` therefore conflates "at sea level" with "provider had
    /// no data", a known accuracy gap.
    pub async fn get_elevations(&self, coords: Vec<Coordinate>) -> Result<Vec<f64>> {
        metrics::counter!(telemetry::REQUESTS_TOTAL).increment(1);
        if coords.is_empty() {
            return Ok(Vec::new());
        }

        let rx = {
            let mut state = self.inner.state.lock().await;

            // Fast path: everything cached, resolve without touching the
            // ledger or the scheduler.
            let cached: Option<Vec<f64>> = coords
                .iter()
                .map(|c| state.cache.get(c).map(|entry| entry.elevation))
                .collect();
            if let Some(values) = cached {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                return Ok(values);
            }
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);

            let (tx, rx) = oneshot::channel();
            state.ledger.push(PendingRequest::new(coords, tx));
            self.ensure_job(&mut state);
            rx
        };

        rx.await.map_err(|_| CairnError::RequestDropped)?
    }

    /// Number of entries currently in the cache.
    pub async fn cache_len(&self) -> usize {
        self.inner.state.lock().await.cache.len()
    }

    /// Seed the cache directly, bypassing the network. Entries participate
    /// in normal eviction.
    pub async fn prime_cache(&self, coords: &[(Coordinate, f64)]) {
        let mut state = self.inner.state.lock().await;
        let now = Instant::now();
        for (coord, elevation) in coords {
            state.cache.put(*coord, *elevation, now);
        }
    }

    /// Start a dispatch job unless one is already running.
    ///
    /// Liveness is judged by job-completion state rather than a separate
    /// "busy" flag, so there is no window where the scheduler is marked
    /// running but never actually ran.
    fn ensure_job(&self, state: &mut State) {
        let running = state.job.as_ref().is_some_and(|job| !job.is_finished());
        if !running {
            debug!("starting elevation dispatch cycle");
            let inner = Arc::clone(&self.inner);
            state.job = Some(tokio::spawn(scheduler::run(inner)));
        }
    }
}
