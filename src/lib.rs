//! Cairn - batching and caching engine for elevation lookups
//!
//! Elevation graphs, route previews, and difficulty scoring all want
//! elevations for large, heavily overlapping coordinate sets, while the
//! remote provider is rate-limited and caps its payload size. This crate
//! sits between the two: it deduplicates coordinates, coalesces concurrent
//! callers into shared round-trips behind a short debounce window, splits
//! working sets into size-capped chunks, caches results with bounded
//! oldest-first eviction, and recovers from transient overload with linear
//! backoff.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cairn::{Coordinate, ElevationService, provider::HttpElevationProvider};
//!
//! #[tokio::main]
//! async fn main() -> cairn::Result<()> {
//!     let service = ElevationService::new(Arc::new(HttpElevationProvider::new()?));
//!
//!     // Concurrent overlapping lookups share one network round-trip.
//!     let route = service.get_elevations(vec![
//!         Coordinate::new(46.537, 7.962),
//!         Coordinate::new(46.541, 7.969),
//!     ]);
//!     let graph = service.get_elevations(vec![
//!         Coordinate::new(46.541, 7.969),
//!     ]);
//!     let (route, graph) = tokio::join!(route, graph);
//!
//!     println!("start: {} m, shared point: {} m", route?[0], graph?[0]);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod coord;
pub mod error;
mod ledger;
pub mod provider;
pub mod service;
pub mod telemetry;

// Re-export main types at crate root
pub use cache::{CacheEntry, ElevationCache};
pub use config::ElevationConfig;
pub use coord::Coordinate;
pub use error::{CairnError, Result};
pub use provider::{ElevationProvider, HttpElevationProvider};
pub use service::ElevationService;
