//! Geographic coordinate used as the cache and dedup key.
//!
//! Equality and hashing are bit-exact over the underlying `f64`s, so a
//! coordinate can key a `HashMap` without rounding or epsilon comparisons.
//! Callers that want nearby points to share a cache entry quantize before
//! constructing a [`Coordinate`]; this type never does it for them.

use std::hash::{Hash, Hasher};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy)]
pub struct Coordinate {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate from decimal degrees.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

// Bitwise equality: NaN payloads and signed zeros are distinct keys. The
// values come from callers verbatim and round-trip unmodified, so the usual
// float-comparison pitfalls do not apply here.
impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.lat.to_bits() == other.lat.to_bits() && self.lon.to_bits() == other.lon.to_bits()
    }
}

impl Eq for Coordinate {}

impl Hash for Coordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lat.to_bits().hash(state);
        self.lon.to_bits().hash(state);
    }
}
