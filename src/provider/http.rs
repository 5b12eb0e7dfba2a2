//! HTTP elevation provider client.
//!
//! Speaks the bulk lookup dialect: one POST per chunk whose body is a JSON
//! array of `[lat, lon]` pairs, answered by `{"elevations": [f64 | null]}`
//! positionally aligned to the request. Nulls mean the provider had no data
//! for that point; normalization is left to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::ElevationProvider;
use crate::coord::Coordinate;
use crate::error::{CairnError, Result};

/// Default base URL for the bulk elevation lookup endpoint.
const DEFAULT_BASE_URL: &str = "https://elevation-api.io/api/elevation";

/// Per-request timeout applied by the underlying client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for a bulk elevation lookup API.
#[derive(Clone)]
pub struct HttpElevationProvider {
    http: Client,
    base_url: String,
}

impl HttpElevationProvider {
    /// Create a provider against the default endpoint.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a provider with a custom base URL (for testing with wiremock
    /// or a self-hosted elevation service).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CairnError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Check response status and map to the error taxonomy.
    fn handle_response_errors(&self, response: &reqwest::Response) -> Result<()> {
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        match status.as_u16() {
            413 => Err(CairnError::PayloadTooLarge),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(CairnError::RateLimited { retry_after })
            }
            code => Err(CairnError::Api {
                status: code,
                message: format!("elevation API error: {status}"),
            }),
        }
    }
}

#[derive(Deserialize)]
struct ElevationResponse {
    elevations: Vec<Option<f64>>,
}

#[async_trait]
impl ElevationProvider for HttpElevationProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, coords: &[Coordinate]) -> Result<Vec<Option<f64>>> {
        let pairs: Vec<[f64; 2]> = coords.iter().map(|c| [c.lat, c.lon]).collect();

        let response = self
            .http
            .post(&self.base_url)
            .json(&pairs)
            .send()
            .await
            .map_err(|e| CairnError::Transport(e.to_string()))?;

        self.handle_response_errors(&response)?;

        let body: ElevationResponse = response
            .json()
            .await
            .map_err(|e| CairnError::MalformedResponse(e.to_string()))?;

        if body.elevations.len() != coords.len() {
            return Err(CairnError::MalformedResponse(format!(
                "expected {} elevations, got {}",
                coords.len(),
                body.elevations.len()
            )));
        }

        Ok(body.elevations)
    }
}
