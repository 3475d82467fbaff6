//! Place identifier resolution.
//!
//! Waypoints that carry a `placeId` are resolved one by one through a
//! place-details lookup, and the returned coordinate is merged into the
//! waypoint's `location.latLng`. Resolution is sequential so progress counts
//! stay exact, and it stops at the first failure or on cancellation.

use futures::future::BoxFuture;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{LatLng, Scenario};

/// Default Google Places Details endpoint.
pub const DEFAULT_PLACES_URL: &str = "https://maps.googleapis.com/maps/api/place/details/json";

/// Error type for place lookups.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaceLookupError {
    #[error("places API key is not configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP {0}")]
    HttpStatus(u16),
    #[error("{status}")]
    Status { status: String },
    #[error("no geometry for place {0}")]
    NoGeometry(String),
}

/// Resolves a place identifier to a coordinate.
pub trait PlaceLookup: Send + Sync {
    fn details<'a>(&'a self, place_id: &'a str) -> BoxFuture<'a, Result<LatLng, PlaceLookupError>>;
}

/// How a resolution run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Every place id was resolved.
    Completed { resolved: usize },
    /// The caller cancelled; progress was reset to zero.
    Cancelled { resolved: usize },
    /// A lookup failed; progress stays at `resolved`.
    Failed { resolved: usize, message: String },
}

impl ResolveOutcome {
    /// Waypoints updated during the run, whatever the outcome.
    pub fn resolved(&self) -> usize {
        match self {
            ResolveOutcome::Completed { resolved }
            | ResolveOutcome::Cancelled { resolved }
            | ResolveOutcome::Failed { resolved, .. } => *resolved,
        }
    }

    /// Progress value reported once the run is over.
    pub fn progress(&self) -> usize {
        match self {
            ResolveOutcome::Cancelled { .. } => 0,
            other => other.resolved(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ResolveOutcome::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Resolves every place-id waypoint of `scenario` in enumeration order.
///
/// `on_progress` receives the number of waypoints resolved so far: `0` at the
/// start, then after every successful lookup, and `0` again on cancellation.
/// Waypoints resolved before a failure or cancellation keep their coordinate.
pub async fn resolve_place_ids<F>(
    scenario: &mut Scenario,
    lookup: &dyn PlaceLookup,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> ResolveOutcome
where
    F: FnMut(usize) + Send,
{
    let waypoints: Vec<_> = scenario
        .waypoints_mut()
        .into_iter()
        .filter(|w| w.place_id().is_some())
        .collect();
    let total = waypoints.len();
    info!(total, "Resolving place ids");

    let mut resolved = 0;
    on_progress(resolved);

    for waypoint in waypoints {
        if cancel.is_cancelled() {
            on_progress(0);
            info!(resolved, total, "Place id resolution cancelled");
            return ResolveOutcome::Cancelled { resolved };
        }

        let Some(place_id) = waypoint.place_id().map(str::to_owned) else {
            continue;
        };
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = lookup.details(&place_id) => Some(result),
        };

        match result {
            None => {
                on_progress(0);
                info!(resolved, total, "Place id resolution cancelled");
                return ResolveOutcome::Cancelled { resolved };
            }
            Some(Ok(lat_lng)) => {
                waypoint.merge_lat_lng(lat_lng);
                resolved += 1;
                debug!(place_id = %place_id, resolved, total, "Resolved place id");
                on_progress(resolved);
            }
            Some(Err(e)) => {
                warn!(place_id = %place_id, error = %e, "Place id lookup failed");
                return ResolveOutcome::Failed {
                    resolved,
                    message: format!("Place ID lookup failed: {}", e),
                };
            }
        }
    }

    info!(resolved, "Place id resolution complete");
    ResolveOutcome::Completed { resolved }
}

// ============================================================================
// Places API
// ============================================================================

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    result: Option<DetailsResult>,
}

#[derive(Debug, Deserialize)]
struct DetailsResult {
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: ApiLatLng,
}

#[derive(Debug, Deserialize)]
struct ApiLatLng {
    lat: f64,
    lng: f64,
}

/// Google Places Details client (`fields=geometry`).
pub struct HttpPlaceLookup {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpPlaceLookup {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PlaceLookupError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| PlaceLookupError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
        })
    }

    async fn request(&self, place_id: &str) -> Result<LatLng, PlaceLookupError> {
        let key = self.api_key.as_deref().ok_or(PlaceLookupError::NotConfigured)?;
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("place_id", place_id), ("fields", "geometry"), ("key", key)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(PlaceLookupError::HttpStatus(response.status().as_u16()));
        }

        let details: DetailsResponse = response.json().await.map_err(|e| self.transport_error(e))?;
        if details.status != "OK" {
            let status = match details.error_message {
                Some(message) => format!("{}: {}", details.status, message),
                None => details.status,
            };
            return Err(PlaceLookupError::Status { status });
        }

        details
            .result
            .and_then(|r| r.geometry)
            .map(|g| LatLng::new(g.location.lat, g.location.lng))
            .ok_or_else(|| PlaceLookupError::NoGeometry(place_id.to_string()))
    }

    fn transport_error(&self, e: reqwest::Error) -> PlaceLookupError {
        let e = e.without_url();
        if e.is_timeout() {
            PlaceLookupError::Timeout(self.timeout)
        } else {
            PlaceLookupError::Network(e.to_string())
        }
    }
}

impl PlaceLookup for HttpPlaceLookup {
    fn details<'a>(&'a self, place_id: &'a str) -> BoxFuture<'a, Result<LatLng, PlaceLookupError>> {
        Box::pin(self.request(place_id))
    }
}
