//! Elevation provider implementations.
//!
//! The [`ElevationProvider`] trait is the transport seam: the scheduler
//! hands it one chunk of coordinates and gets back positionally aligned
//! elevations. Production code uses [`HttpElevationProvider`]; tests inject
//! scripted implementations.

pub mod http;

pub use http::HttpElevationProvider;

use async_trait::async_trait;

use crate::coord::Coordinate;
use crate::error::Result;

/// One outbound request per call: fetch elevations for a coordinate chunk.
#[async_trait]
pub trait ElevationProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Fetch elevations for `coords`.
    ///
    /// The returned vec is positionally aligned with `coords`; `None` means
    /// the provider had no data for that point. Implementations must not
    /// retry internally: retry, backoff, and payload splitting are the
    /// scheduler's job, driven by the error classification on
    /// [`CairnError`](crate::CairnError).
    async fn fetch(&self, coords: &[Coordinate]) -> Result<Vec<Option<f64>>>;
}
