//! Tuning knobs for the elevation service.

use std::time::Duration;

/// Default wait for near-simultaneous callers to join one round-trip.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Default maximum coordinates in one outbound chunk request.
pub const DEFAULT_MAX_COORDINATES_PER_REQUEST: usize = 500;

/// Default cache capacity. Chosen as safe on constrained mobile memory
/// while covering the coordinate volume of a single long hike.
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 100_000;

/// Default number of consecutive transient failures before the pending set
/// is terminally failed.
pub const DEFAULT_MAX_FAILED_REQUESTS: u32 = 5;

/// Default backoff unit; the actual delay is `failure_count * unit`.
pub const DEFAULT_RETRY_DELAY_UNIT: Duration = Duration::from_millis(1000);

/// Configuration for [`ElevationService`](crate::ElevationService).
///
/// Defaults are tuned for mobile use against public elevation APIs;
/// override per field:
///
/// ```rust
/// # use cairn::ElevationConfig;
/// # use std::time::Duration;
/// let config = ElevationConfig::new()
///     .debounce_delay(Duration::from_millis(100))
///     .max_coordinates_per_request(100);
/// ```
#[derive(Debug, Clone)]
pub struct ElevationConfig {
    /// How long a dispatch cycle waits for more callers before issuing
    /// network requests. Skipped when the working set already fills a chunk.
    pub debounce_delay: Duration,
    /// Upper bound on coordinates per outbound request.
    pub max_coordinates_per_request: usize,
    /// Upper bound on cached coordinate entries; oldest evicted first.
    pub max_cache_entries: usize,
    /// Consecutive transient failures tolerated before failing the pending
    /// set terminally.
    pub max_failed_requests: u32,
    /// Linear backoff unit: retry N sleeps `N * retry_delay_unit`.
    pub retry_delay_unit: Duration,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            debounce_delay: DEFAULT_DEBOUNCE_DELAY,
            max_coordinates_per_request: DEFAULT_MAX_COORDINATES_PER_REQUEST,
            max_cache_entries: DEFAULT_MAX_CACHE_ENTRIES,
            max_failed_requests: DEFAULT_MAX_FAILED_REQUESTS,
            retry_delay_unit: DEFAULT_RETRY_DELAY_UNIT,
        }
    }
}

impl ElevationConfig {
    /// Create a config with the default tuning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce window for coalescing concurrent callers.
    pub fn debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// Set the maximum coordinates per outbound request.
    pub fn max_coordinates_per_request(mut self, n: usize) -> Self {
        self.max_coordinates_per_request = n;
        self
    }

    /// Set the cache capacity in entries.
    pub fn max_cache_entries(mut self, n: usize) -> Self {
        self.max_cache_entries = n;
        self
    }

    /// Set the transient-failure budget.
    pub fn max_failed_requests(mut self, n: u32) -> Self {
        self.max_failed_requests = n;
        self
    }

    /// Set the linear backoff unit.
    pub fn retry_delay_unit(mut self, unit: Duration) -> Self {
        self.retry_delay_unit = unit;
        self
    }

    /// Backoff delay before retry number `failure_count` (1-indexed).
    ///
    /// Linear, not exponential: the unit scales with the consecutive-failure
    /// count. A provider `retry-after` hint takes precedence when present.
    pub fn backoff_delay(&self, failure_count: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.retry_delay_unit.saturating_mul(failure_count))
    }
}
