//! Behavioural tests for the elevation service scheduler: coalescing,
//! deduplication, chunk splitting, failure policy, and cache bounds.
//!
//! All tests run on a paused tokio clock, so debounce windows and backoff
//! delays elapse deterministically without wall-clock waits.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cairn::{
    CairnError, Coordinate, ElevationConfig, ElevationProvider, ElevationService, Result,
};

/// What the scripted provider should do for one fetch call.
#[derive(Clone)]
enum Reply {
    /// Respond with `lat * 10.0` for every coordinate.
    Elevations,
    /// Respond with null for every coordinate.
    Nulls,
    Fail(CairnError),
}

/// Provider double that replays a script and records every chunk it is
/// handed. Once the script is exhausted it keeps answering `Elevations`.
struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Vec<Coordinate>>>,
}

impl ScriptedProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn script(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn script_n(&self, reply: Reply, n: usize) {
        for _ in 0..n {
            self.script(reply.clone());
        }
    }

    fn calls(&self) -> Vec<Vec<Coordinate>> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ElevationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, coords: &[Coordinate]) -> Result<Vec<Option<f64>>> {
        self.calls.lock().unwrap().push(coords.to_vec());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Elevations);
        match reply {
            Reply::Elevations => Ok(coords.iter().map(|c| Some(c.lat * 10.0)).collect()),
            Reply::Nulls => Ok(vec![None; coords.len()]),
            Reply::Fail(err) => Err(err),
        }
    }
}

fn coord(i: u32) -> Coordinate {
    Coordinate::new(f64::from(i), -f64::from(i))
}

fn test_config() -> ElevationConfig {
    ElevationConfig::new()
        .debounce_delay(Duration::from_millis(500))
        .retry_delay_unit(Duration::from_millis(1000))
}

#[tokio::test(start_paused = true)]
async fn empty_input_resolves_without_network() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    let result = service.get_elevations(Vec::new()).await.unwrap();
    assert!(result.is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn requery_of_cached_coordinate_skips_network() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    let first = service.get_elevations(vec![coord(1)]).await.unwrap();
    assert_eq!(provider.call_count(), 1);

    let second = service.get_elevations(vec![coord(1)]).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(provider.call_count(), 1, "cache hit must not dispatch");
}

#[tokio::test(start_paused = true)]
async fn concurrent_overlapping_callers_share_one_chunk() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    let route = service.get_elevations(vec![coord(1), coord(2), coord(3)]);
    let graph = service.get_elevations(vec![coord(2), coord(3), coord(4)]);
    let (route, graph) = tokio::join!(route, graph);

    assert_eq!(route.unwrap(), vec![10.0, 20.0, 30.0]);
    assert_eq!(graph.unwrap(), vec![20.0, 30.0, 40.0]);

    // Both callers joined the same debounce window: one network call, and
    // each shared coordinate appears exactly once in its chunk.
    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], vec![coord(1), coord(2), coord(3), coord(4)]);
}

#[tokio::test(start_paused = true)]
async fn output_is_index_aligned_including_duplicates() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    let result = service
        .get_elevations(vec![coord(1), coord(2), coord(1)])
        .await
        .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result[0], result[2]);
    assert_eq!(result, vec![10.0, 20.0, 10.0]);
    // Network-level dedup underneath: the duplicate was fetched once.
    assert_eq!(provider.calls()[0], vec![coord(1), coord(2)]);
}

#[tokio::test(start_paused = true)]
async fn oversized_working_set_splits_into_chunks() {
    let provider = ScriptedProvider::new();
    let config = test_config().max_coordinates_per_request(3);
    let service = ElevationService::with_config(provider.clone(), config);

    let coords: Vec<Coordinate> = (0..7).map(coord).collect();
    let result = service.get_elevations(coords.clone()).await.unwrap();

    assert_eq!(result.len(), 7);
    assert_eq!(result[6], 60.0);

    let calls = provider.calls();
    let sizes: Vec<usize> = calls.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    let dispatched: Vec<Coordinate> = calls.into_iter().flatten().collect();
    assert_eq!(dispatched, coords);
}

#[tokio::test(start_paused = true)]
async fn null_elevations_resolve_to_zero() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    provider.script(Reply::Nulls);
    let result = service
        .get_elevations(vec![coord(1), coord(2)])
        .await
        .unwrap();

    assert_eq!(result, vec![0.0, 0.0]);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_fails_fast_without_retry() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    provider.script(Reply::Fail(CairnError::Transport(
        "connection refused".into(),
    )));
    let result = service.get_elevations(vec![coord(1)]).await;

    assert!(matches!(result, Err(CairnError::Transport(_))));
    assert_eq!(provider.call_count(), 1, "connectivity failures never retry");
}

#[tokio::test(start_paused = true)]
async fn unrecognized_status_is_terminal_for_the_chunk() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    provider.script(Reply::Fail(CairnError::Api {
        status: 400,
        message: "bad request".into(),
    }));
    let result = service.get_elevations(vec![coord(1)]).await;

    assert!(matches!(result, Err(CairnError::Api { status: 400, .. })));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn chunk_failure_spares_requests_in_other_chunks() {
    let provider = ScriptedProvider::new();
    let config = test_config().max_coordinates_per_request(2);
    let service = ElevationService::with_config(provider.clone(), config);

    // Four distinct coordinates form two chunks; the first chunk's status
    // is terminal, the second succeeds.
    provider.script(Reply::Fail(CairnError::Api {
        status: 403,
        message: "forbidden".into(),
    }));
    provider.script(Reply::Elevations);

    let doomed = service.get_elevations(vec![coord(1), coord(2)]);
    let fine = service.get_elevations(vec![coord(3), coord(4)]);
    let (doomed, fine) = tokio::join!(doomed, fine);

    assert!(matches!(doomed, Err(CairnError::Api { status: 403, .. })));
    assert_eq!(fine.unwrap(), vec![30.0, 40.0]);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_then_succeed() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    provider.script(Reply::Fail(CairnError::Api {
        status: 500,
        message: "overloaded".into(),
    }));
    provider.script(Reply::Fail(CairnError::Api {
        status: 502,
        message: "bad gateway".into(),
    }));
    provider.script(Reply::Elevations);

    let result = service.get_elevations(vec![coord(1)]).await.unwrap();
    assert_eq!(result, vec![10.0]);
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn backoff_exhaustion_fails_pending_set_and_resets_counter() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    provider.script_n(
        Reply::Fail(CairnError::Api {
            status: 500,
            message: "overloaded".into(),
        }),
        5,
    );

    let result = service.get_elevations(vec![coord(1)]).await;
    assert!(matches!(
        result,
        Err(CairnError::RetriesExhausted { attempts: 5 })
    ));
    assert_eq!(provider.call_count(), 5);

    // Counter reset: the next lookup is not immediately failed and needs
    // exactly one more provider call.
    let result = service.get_elevations(vec![coord(2)]).await.unwrap();
    assert_eq!(result, vec![20.0]);
    assert_eq!(provider.call_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_hint_is_respected_then_retried() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    provider.script(Reply::Fail(CairnError::RateLimited {
        retry_after: Some(Duration::from_secs(30)),
    }));
    provider.script(Reply::Elevations);

    let result = service.get_elevations(vec![coord(1)]).await.unwrap();
    assert_eq!(result, vec![10.0]);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn payload_too_large_recovers_by_halving_requests() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    // The coalesced chunk is rejected as too large; the two pending
    // requests are then dispatched as halves, each succeeding.
    provider.script(Reply::Fail(CairnError::PayloadTooLarge));

    let first = service.get_elevations(vec![coord(1), coord(2)]);
    let second = service.get_elevations(vec![coord(3), coord(4)]);
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), vec![10.0, 20.0]);
    assert_eq!(second.unwrap(), vec![30.0, 40.0]);

    let calls = provider.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].len(), 4, "full working set first");
    assert_eq!(calls[1], vec![coord(1), coord(2)]);
    assert_eq!(calls[2], vec![coord(3), coord(4)]);
}

#[tokio::test(start_paused = true)]
async fn cache_stays_bounded_and_refetches_evicted_points() {
    let provider = ScriptedProvider::new();
    let config = test_config().max_cache_entries(3);
    let service = ElevationService::with_config(provider.clone(), config);

    // Sequential lookups give each cache entry a distinct write time.
    for i in 0..5 {
        service.get_elevations(vec![coord(i)]).await.unwrap();
    }
    assert_eq!(service.cache_len().await, 3);
    assert_eq!(provider.call_count(), 5);

    // The oldest entries were evicted: re-querying one costs a fresh
    // network call, while the newest is still a cache hit.
    service.get_elevations(vec![coord(0)]).await.unwrap();
    assert_eq!(provider.call_count(), 6);
    service.get_elevations(vec![coord(4)]).await.unwrap();
    assert_eq!(provider.call_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn primed_cache_serves_without_dispatch() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    service
        .prime_cache(&[(coord(1), 111.0), (coord(2), 222.0)])
        .await;

    let result = service
        .get_elevations(vec![coord(2), coord(1)])
        .await
        .unwrap();
    assert_eq!(result, vec![222.0, 111.0]);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn late_caller_is_served_by_a_following_cycle() {
    let provider = ScriptedProvider::new();
    let service = ElevationService::with_config(provider.clone(), test_config());

    let early = service.get_elevations(vec![coord(1)]);
    let late = async {
        // Arrive after the first cycle's debounce window has elapsed.
        tokio::time::sleep(Duration::from_millis(600)).await;
        service.get_elevations(vec![coord(2)]).await
    };
    let (early, late) = tokio::join!(early, late);

    assert_eq!(early.unwrap(), vec![10.0]);
    assert_eq!(late.unwrap(), vec![20.0]);
}
