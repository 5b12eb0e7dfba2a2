//! Telemetry metric name constants.
//!
//! Centralised metric names for cairn operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `cairn_`. Counters end in `_total`.

/// Total caller lookups accepted by the service.
pub const REQUESTS_TOTAL: &str = "cairn_requests_total";

/// Lookups satisfied entirely from the cache, with no network dispatch.
pub const CACHE_HITS_TOTAL: &str = "cairn_cache_hits_total";

/// Lookups that had at least one uncached coordinate and entered the ledger.
pub const CACHE_MISSES_TOTAL: &str = "cairn_cache_misses_total";

/// Chunk requests dispatched to the elevation provider.
pub const CHUNKS_DISPATCHED_TOTAL: &str = "cairn_chunks_dispatched_total";

/// Backoff retries of the pending set after transient provider failures.
pub const RETRIES_TOTAL: &str = "cairn_retries_total";

/// Cache entries removed by the oversize eviction pass.
pub const EVICTIONS_TOTAL: &str = "cairn_evictions_total";
