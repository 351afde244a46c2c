//! Drive-time routing client
//!
//! Talks to the Waze live-map routing API: geocode both endpoints, then
//! request a route and sum segment cross times. Failures surface as
//! `AppError::Upstream`; the zone classifier decides whether a single failed
//! base is fatal.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use tripoint_core::traits::{RouteEstimate, RoutingGateway};
use tripoint_core::{AppError, AppResult};

const LIVEMAP_BASE: &str = "https://www.waze.com";

/// Waze-backed routing gateway
pub struct WazeRoutingClient {
    http: reqwest::Client,
    base_url: String,
    region: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    location: Option<GeocodeLocation>,
}

#[derive(Debug, Deserialize)]
struct GeocodeLocation {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct RoutingResponse {
    response: Option<RouteAlternative>,
    alternatives: Option<Vec<AlternativeWrapper>>,
}

#[derive(Debug, Deserialize)]
struct AlternativeWrapper {
    response: RouteAlternative,
}

#[derive(Debug, Deserialize)]
struct RouteAlternative {
    results: Vec<RouteSegment>,
}

#[derive(Debug, Deserialize)]
struct RouteSegment {
    /// Segment travel time in seconds
    #[serde(rename = "crossTime")]
    cross_time: i64,

    /// Segment length in metres
    length: i64,
}

impl WazeRoutingClient {
    /// Create a routing client for a region (`EU`, `US`, `IL`)
    pub fn new(region: &str, timeout_secs: u64) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: LIVEMAP_BASE.to_string(),
            region: region.to_string(),
        })
    }

    /// Override the API base URL (tests)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Routing endpoint path for the configured region
    fn routing_path(&self) -> &'static str {
        match self.region.as_str() {
            "US" | "NA" => "RoutingManager/routingRequest",
            "IL" => "il-RoutingManager/routingRequest",
            _ => "row-RoutingManager/routingRequest",
        }
    }

    /// Resolve an address to coordinates
    async fn geocode(&self, address: &str) -> AppResult<(f64, f64)> {
        let url = format!("{}/SearchServer/mozi", self.base_url);

        let hits: Vec<GeocodeHit> = self
            .http
            .get(&url)
            .query(&[("q", address), ("lang", "eng"), ("origin", "livemap")])
            .send()
            .await
            .map_err(|e| {
                warn!("Geocode request failed for {}: {}", address, e);
                AppError::Upstream(format!("Routing geocode failed: {}", e))
            })?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Routing geocode failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Routing geocode parse failed: {}", e)))?;

        hits.into_iter()
            .find_map(|hit| hit.location)
            .map(|loc| (loc.lat, loc.lon))
            .ok_or_else(|| AppError::Upstream(format!("No geocode result for {}", address)))
    }
}

#[async_trait]
impl RoutingGateway for WazeRoutingClient {
    #[instrument(skip(self))]
    async fn route(&self, origin: &str, destination: &str) -> AppResult<RouteEstimate> {
        debug!("Routing {} -> {}", origin, destination);

        let (from_lat, from_lon) = self.geocode(origin).await?;
        let (to_lat, to_lon) = self.geocode(destination).await?;

        let url = format!("{}/{}", self.base_url, self.routing_path());
        let from = format!("x:{} y:{}", from_lon, from_lat);
        let to = format!("x:{} y:{}", to_lon, to_lat);

        let body: RoutingResponse = self
            .http
            .get(&url)
            .query(&[
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("at", "0"),
                ("returnJSON", "true"),
                ("timeout", "60000"),
                ("nPaths", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!("Routing request failed: {}", e);
                AppError::Upstream(format!("Routing request failed: {}", e))
            })?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Routing request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Routing response parse failed: {}", e)))?;

        let alternative = body
            .response
            .or_else(|| {
                body.alternatives
                    .and_then(|mut alts| alts.drain(..).next().map(|a| a.response))
            })
            .ok_or_else(|| AppError::Upstream("Routing returned no route".to_string()))?;

        if alternative.results.is_empty() {
            return Err(AppError::Upstream("Routing returned no segments".to_string()));
        }

        let total_secs: i64 = alternative.results.iter().map(|s| s.cross_time).sum();
        let total_metres: i64 = alternative.results.iter().map(|s| s.length).sum();

        Ok(RouteEstimate {
            minutes: total_secs as f64 / 60.0,
            distance_km: total_metres as f64 / 1000.0,
        })
    }
}
