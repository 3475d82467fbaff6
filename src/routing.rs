//! Distance matrix client for heavy-vehicle scenarios.
//!
//! Queries a Google-compatible distance-matrix endpoint
//! (`?origins=lat,lng|...&destinations=...&key=...`) and turns the response
//! into a [`DurationDistanceMatrix`] of seconds and meters.

use futures::future::BoxFuture;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::domain::{DurationDistanceMatrix, MatrixRow};

/// Default distance-matrix endpoint.
pub const DEFAULT_DISTANCE_MATRIX_URL: &str =
    "https://api.distancematrix.ai/maps/api/distancematrix/json";

/// Error type for distance matrix operations.
#[derive(Debug, thiserror::Error)]
pub enum DistanceMatrixError {
    /// No API key is configured.
    #[error("distance matrix API key is not configured")]
    NotConfigured,
    /// Request could not be sent or the body could not be read.
    #[error("distance matrix request failed: {0}")]
    Network(String),
    /// Request exceeded the configured timeout.
    #[error("distance matrix request timed out after {0:?}")]
    Timeout(Duration),
    /// Endpoint answered with a non-success HTTP status.
    #[error("distance matrix API returned HTTP {0}")]
    HttpStatus(u16),
    /// Endpoint answered with a non-`OK` status field.
    #[error("distance matrix API returned status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    ApiStatus {
        status: String,
        message: Option<String>,
    },
    /// Response does not match the requested shape.
    #[error("malformed distance matrix response: {0}")]
    Malformed(String),
    /// No element carries a distance or duration.
    #[error("distance matrix response contains no distances or durations")]
    EmptyMatrix,
}

/// A coordinate pair as read from the workbook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Identity key `lat,lng`, using the shortest round-trip decimal form.
    ///
    /// ```
    /// use fleet_routing_uploads::routing::Point;
    ///
    /// assert_eq!(Point::new(19.4326, -99.1332).key(), "19.4326,-99.1332");
    /// assert_eq!(Point::new(19.0, -99.0).key(), "19,-99");
    /// ```
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Deduplicates points by [`Point::key`], keeping first-occurrence order.
///
/// ```
/// use fleet_routing_uploads::routing::{unique_points, Point};
///
/// let points = [Point::new(1.0, 2.0), Point::new(3.0, 4.0), Point::new(1.0, 2.0)];
/// let unique = unique_points(&points);
/// assert_eq!(unique, vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);
/// assert_eq!(unique_points(&unique), unique);
/// ```
pub fn unique_points(points: &[Point]) -> Vec<Point> {
    let mut seen = HashSet::new();
    points
        .iter()
        .filter(|p| seen.insert(p.key()))
        .copied()
        .collect()
}

/// Joins points as `lat,lng|lat,lng`.
pub fn join_points(points: &[Point]) -> String {
    points
        .iter()
        .map(Point::key)
        .collect::<Vec<_>>()
        .join("|")
}

// ============================================================================
// API Response
// ============================================================================

/// Distance-matrix API response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DistanceMatrixResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub origin_addresses: Vec<String>,
    #[serde(default)]
    pub destination_addresses: Vec<String>,
    #[serde(default)]
    pub rows: Vec<ResponseRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseRow {
    #[serde(default)]
    pub elements: Vec<ResponseElement>,
}

/// One origin/destination cell. Values are absent when no route exists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseElement {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub distance: Option<Measure>,
    #[serde(default)]
    pub duration: Option<Measure>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Measure {
    #[serde(default)]
    pub value: Option<f64>,
}

impl Measure {
    fn has_value(measure: Option<&Measure>) -> bool {
        measure.and_then(|m| m.value).is_some_and(f64::is_finite)
    }

    fn rounded(measure: Option<&Measure>) -> i64 {
        measure
            .and_then(|m| m.value)
            .filter(|v| v.is_finite())
            .map(|v| v.round() as i64)
            .unwrap_or(0)
    }
}

/// Builds an `n x m` matrix, defaulting missing values to zero.
///
/// Fails when the response does not have `n` rows of `m` elements, or when
/// no element carries any distance or duration value at all.
///
/// ```
/// use fleet_routing_uploads::routing::{build_duration_distance_matrix, DistanceMatrixResponse};
///
/// let response: DistanceMatrixResponse = serde_json::from_value(serde_json::json!({
///     "rows": [{"elements": [
///         {"distance": {"value": 1200}, "duration": {"value": 300.4}},
///         {"status": "ZERO_RESULTS"}
///     ]}]
/// })).unwrap();
///
/// let matrix = build_duration_distance_matrix(&response, 1, 2).unwrap();
/// assert_eq!(matrix.rows[0].meters, vec![1200, 0]);
/// assert_eq!(matrix.rows[0].durations, vec![300, 0]);
/// ```
pub fn build_duration_distance_matrix(
    response: &DistanceMatrixResponse,
    n: usize,
    m: usize,
) -> Result<DurationDistanceMatrix, DistanceMatrixError> {
    if response.rows.len() != n {
        return Err(DistanceMatrixError::Malformed(format!(
            "expected {} rows, got {}",
            n,
            response.rows.len()
        )));
    }

    let mut carries_values = false;
    let mut rows = Vec::with_capacity(n);
    for (i, row) in response.rows.iter().enumerate() {
        if row.elements.len() != m {
            return Err(DistanceMatrixError::Malformed(format!(
                "row {} has {} elements, expected {}",
                i,
                row.elements.len(),
                m
            )));
        }
        let mut durations = Vec::with_capacity(m);
        let mut meters = Vec::with_capacity(m);
        for element in &row.elements {
            carries_values |= Measure::has_value(element.distance.as_ref())
                || Measure::has_value(element.duration.as_ref());
            durations.push(Measure::rounded(element.duration.as_ref()));
            meters.push(Measure::rounded(element.distance.as_ref()));
        }
        rows.push(MatrixRow { durations, meters });
    }

    if n > 0 && m > 0 && !carries_values {
        return Err(DistanceMatrixError::EmptyMatrix);
    }

    Ok(DurationDistanceMatrix { rows })
}

// ============================================================================
// Sources
// ============================================================================

/// Something that can compute a distance matrix between point lists.
pub trait DistanceMatrixSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        origins: &'a [Point],
        destinations: &'a [Point],
    ) -> BoxFuture<'a, Result<DistanceMatrixResponse, DistanceMatrixError>>;
}

/// HTTP client for the distance-matrix API.
pub struct HttpDistanceMatrix {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpDistanceMatrix {
    /// Creates a client. A missing key is reported on first use.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DistanceMatrixError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(concat!("fleet-routing-uploads/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DistanceMatrixError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
        })
    }

    async fn request(
        &self,
        origins: &[Point],
        destinations: &[Point],
    ) -> Result<DistanceMatrixResponse, DistanceMatrixError> {
        let key = self.api_key.as_deref().ok_or(DistanceMatrixError::NotConfigured)?;

        info!(
            origins = origins.len(),
            destinations = destinations.len(),
            "Requesting distance matrix"
        );

        let origins = join_points(origins);
        let destinations = join_points(destinations);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("origins", origins.as_str()),
                ("destinations", destinations.as_str()),
                ("key", key),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        debug!(status = %response.status(), "Received distance matrix response");

        if !response.status().is_success() {
            return Err(DistanceMatrixError::HttpStatus(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let data: DistanceMatrixResponse = serde_json::from_slice(&body)
            .map_err(|e| DistanceMatrixError::Malformed(e.to_string()))?;

        match data.status.as_deref() {
            None | Some("OK") => Ok(data),
            Some(status) => Err(DistanceMatrixError::ApiStatus {
                status: status.to_string(),
                message: data.error_message.clone(),
            }),
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> DistanceMatrixError {
        // Strip the URL: it carries the API key.
        let e = e.without_url();
        if e.is_timeout() {
            error!(timeout = ?self.timeout, "Distance matrix request timed out");
            DistanceMatrixError::Timeout(self.timeout)
        } else {
            error!("Distance matrix request failed: {}", e);
            DistanceMatrixError::Network(e.to_string())
        }
    }
}

impl DistanceMatrixSource for HttpDistanceMatrix {
    fn fetch<'a>(
        &'a self,
        origins: &'a [Point],
        destinations: &'a [Point],
    ) -> BoxFuture<'a, Result<DistanceMatrixResponse, DistanceMatrixError>> {
        Box::pin(self.request(origins, destinations))
    }
}
