//! Domain model for routing scenarios and solutions.
//!
//! # Overview
//!
//! - [`Scenario`]: the uploaded or spreadsheet-built request document
//! - [`ShipmentModel`]: global time bounds, [`Shipment`]s and [`Vehicle`]s
//! - [`Waypoint`]: a coordinate or a place identifier, resolved in place
//! - [`DurationDistanceMatrix`]: travel matrices attached for heavy vehicles
//! - [`Solution`]: routes returned by the optimizer for a scenario
//!
//! # Field names
//!
//! Input accepts both camelCase and snake_case names, as protobuf JSON
//! parsers do. Output keeps the exact key shapes the spreadsheet converter
//! produces (`global_start_time`, `timeWindows`, `start_time`, ...).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Load type used for spreadsheet demands and capacities.
pub const WEIGHT_KILOGRAMS: &str = "weight_kilograms";

/// A verbatim scalar: integer, float or text.
///
/// Timestamps copied from spreadsheet cells keep whatever form the cell had.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Numeric value, if the scalar is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(_) => None,
        }
    }

    /// Builds a scalar from a float, collapsing integral values.
    ///
    /// ```
    /// use fleet_routing_uploads::domain::Scalar;
    ///
    /// assert_eq!(Scalar::from_f64(300.0), Scalar::Integer(300));
    /// assert_eq!(Scalar::from_f64(0.5), Scalar::Float(0.5));
    /// ```
    pub fn from_f64(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            Scalar::Integer(n as i64)
        } else {
            Scalar::Float(n)
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Integer(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Scalar::Integer(i)),
                None => n
                    .as_f64()
                    .map(Scalar::Float)
                    .ok_or_else(|| D::Error::custom(format!("number {} out of range", n))),
            },
            Value::String(s) => Ok(Scalar::Text(s)),
            other => Err(D::Error::custom(format!(
                "invalid type: {}, expected a number or string",
                json_kind(&other)
            ))),
        }
    }
}

/// Describes a JSON value's type for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Deserializes an int64 carried as a JSON string or number into its text.
fn int64_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "invalid type: {}, expected an integer or integer string",
            json_kind(&other)
        ))),
    }
}

/// Deserializes an int64 carried as a JSON string or number.
fn int64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let text = int64_text(deserializer)?;
    text.trim()
        .parse()
        .map_err(|_| D::Error::custom(format!("invalid int64 value `{}`", text)))
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// The location part of a waypoint.
///
/// Unknown fields are retained so that resolving a place id only touches
/// `latLng`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointLocation {
    #[serde(default, alias = "lat_lng", skip_serializing_if = "Option::is_none")]
    pub lat_lng: Option<LatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<i32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A stop given either as a coordinate or as a place identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<WaypointLocation>,
    #[serde(default, alias = "place_id", skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, alias = "side_of_road", skip_serializing_if = "Option::is_none")]
    pub side_of_road: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Waypoint {
    /// Creates a waypoint that only carries a place identifier.
    pub fn from_place_id(place_id: impl Into<String>) -> Self {
        Self {
            place_id: Some(place_id.into()),
            ..Default::default()
        }
    }

    /// Returns the place id if it is set and non-empty.
    pub fn place_id(&self) -> Option<&str> {
        self.place_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn lat_lng(&self) -> Option<LatLng> {
        self.location.as_ref().and_then(|l| l.lat_lng)
    }

    /// Sets the coordinate, keeping every other location field.
    ///
    /// ```
    /// use fleet_routing_uploads::domain::{LatLng, Waypoint, WaypointLocation};
    ///
    /// let mut waypoint = Waypoint {
    ///     location: Some(WaypointLocation { heading: Some(90), ..Default::default() }),
    ///     ..Waypoint::from_place_id("ChIJ123")
    /// };
    /// waypoint.merge_lat_lng(LatLng::new(19.43, -99.13));
    ///
    /// let location = waypoint.location.unwrap();
    /// assert_eq!(location.heading, Some(90));
    /// assert_eq!(location.lat_lng, Some(LatLng::new(19.43, -99.13)));
    /// assert_eq!(waypoint.place_id.as_deref(), Some("ChIJ123"));
    /// ```
    pub fn merge_lat_lng(&mut self, lat_lng: LatLng) {
        self.location.get_or_insert_with(Default::default).lat_lng = Some(lat_lng);
    }
}

/// A typed quantity such as `weight_kilograms`.
///
/// The value is an int64 and travels as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "int64_text")]
    pub value: String,
}

impl Load {
    pub fn weight_kilograms(value: impl Into<String>) -> Self {
        Self {
            kind: WEIGHT_KILOGRAMS.to_string(),
            value: value.into(),
        }
    }
}

/// A time window. Bounds are verbatim scalars (timestamps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default, alias = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Scalar>,
    #[serde(default, alias = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Scalar>,
}

/// Service duration.
///
/// Serialized as `{"seconds": n}`; on input also accepts the protobuf string
/// form `"300s"` and int64 strings for `seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceDuration {
    pub seconds: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub nanos: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl ServiceDuration {
    pub fn from_seconds(seconds: i64) -> Self {
        Self { seconds, nanos: 0 }
    }

    fn parse(text: &str) -> Option<Self> {
        let secs: f64 = text.trim().strip_suffix('s')?.parse().ok()?;
        if !secs.is_finite() {
            return None;
        }
        Some(Self {
            seconds: secs.trunc() as i64,
            nanos: (secs.fract() * 1e9).round() as i32,
        })
    }
}

impl<'de> Deserialize<'de> for ServiceDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Parts {
            #[serde(default, deserialize_with = "int64")]
            seconds: i64,
            #[serde(default)]
            nanos: i32,
        }

        match Value::deserialize(deserializer)? {
            Value::String(s) => {
                Self::parse(&s).ok_or_else(|| D::Error::custom(format!("invalid duration `{}`", s)))
            }
            value @ Value::Object(_) => {
                let parts = Parts::deserialize(value).map_err(D::Error::custom)?;
                Ok(Self {
                    seconds: parts.seconds,
                    nanos: parts.nanos,
                })
            }
            other => Err(D::Error::custom(format!(
                "invalid type: {}, expected a duration",
                json_kind(&other)
            ))),
        }
    }
}

/// A pickup or delivery request of a shipment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRequest {
    #[serde(default, alias = "arrival_location", skip_serializing_if = "Option::is_none")]
    pub arrival_location: Option<LatLng>,
    #[serde(default, alias = "arrival_waypoint", skip_serializing_if = "Option::is_none")]
    pub arrival_waypoint: Option<Waypoint>,
    #[serde(default, alias = "departure_location", skip_serializing_if = "Option::is_none")]
    pub departure_location: Option<LatLng>,
    #[serde(default, alias = "departure_waypoint", skip_serializing_if = "Option::is_none")]
    pub departure_waypoint: Option<Waypoint>,
    #[serde(default, alias = "time_windows")]
    pub time_windows: Vec<TimeWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<ServiceDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A shipment with its demands and visit requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    #[serde(default)]
    pub demands: Vec<Load>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pickups: Vec<VisitRequest>,
    #[serde(default)]
    pub deliveries: Vec<VisitRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A vehicle with its start/end points, capacities and costs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[serde(default, alias = "start_location", skip_serializing_if = "Option::is_none")]
    pub start_location: Option<LatLng>,
    #[serde(default, alias = "start_waypoint", skip_serializing_if = "Option::is_none")]
    pub start_waypoint: Option<Waypoint>,
    #[serde(default, alias = "end_location", skip_serializing_if = "Option::is_none")]
    pub end_location: Option<LatLng>,
    #[serde(default, alias = "end_waypoint", skip_serializing_if = "Option::is_none")]
    pub end_waypoint: Option<Waypoint>,
    #[serde(default)]
    pub capacities: Vec<Load>,
    #[serde(default, alias = "cost_per_hour", skip_serializing_if = "Option::is_none")]
    pub cost_per_hour: Option<f64>,
    #[serde(default, alias = "cost_per_kilometer", skip_serializing_if = "Option::is_none")]
    pub cost_per_kilometer: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The shipment model: global bounds, shipments and vehicles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentModel {
    #[serde(default, alias = "globalStartTime", skip_serializing_if = "Option::is_none")]
    pub global_start_time: Option<Scalar>,
    #[serde(default, alias = "globalEndTime", skip_serializing_if = "Option::is_none")]
    pub global_end_time: Option<Scalar>,
    #[serde(default)]
    pub shipments: Vec<Shipment>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

/// One row of a duration/distance matrix: seconds and meters per destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub durations: Vec<i64>,
    pub meters: Vec<i64>,
}

/// A duration/distance matrix indexed by origin (rows) and destination (columns).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationDistanceMatrix {
    pub rows: Vec<MatrixRow>,
}

impl DurationDistanceMatrix {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column count; rows are always equally long.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(|r| r.durations.len()).unwrap_or(0)
    }
}

/// A routing scenario document.
///
/// # Examples
///
/// ```
/// use fleet_routing_uploads::domain::Scenario;
///
/// let scenario: Scenario = serde_json::from_str(
///     r#"{"model": {"globalStartTime": "2024-05-06T08:00:00Z", "vehicles": [{}]}}"#,
/// ).unwrap();
/// assert_eq!(scenario.model.vehicles.len(), 1);
///
/// // Output uses snake_case model bounds.
/// let json = serde_json::to_value(&scenario).unwrap();
/// assert_eq!(json["model"]["global_start_time"], "2024-05-06T08:00:00Z");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub model: ShipmentModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, alias = "durationDistanceMatrices", skip_serializing_if = "Vec::is_empty")]
    pub duration_distance_matrices: Vec<DurationDistanceMatrix>,
    #[serde(default, alias = "durationDistanceMatrixSrcTags", skip_serializing_if = "Vec::is_empty")]
    pub duration_distance_matrix_src_tags: Vec<Vec<String>>,
    #[serde(default, alias = "durationDistanceMatrixDstTags", skip_serializing_if = "Vec::is_empty")]
    pub duration_distance_matrix_dst_tags: Vec<Vec<String>>,
}

impl Scenario {
    /// All waypoints in resolution order: per shipment its pickups then its
    /// deliveries (arrival then departure), then per vehicle start then end.
    pub fn waypoints(&self) -> Vec<&Waypoint> {
        let mut waypoints = Vec::new();
        for shipment in &self.model.shipments {
            for visit in shipment.pickups.iter().chain(&shipment.deliveries) {
                waypoints.extend(visit.arrival_waypoint.as_ref());
                waypoints.extend(visit.departure_waypoint.as_ref());
            }
        }
        for vehicle in &self.model.vehicles {
            waypoints.extend(vehicle.start_waypoint.as_ref());
            waypoints.extend(vehicle.end_waypoint.as_ref());
        }
        waypoints
    }

    /// Mutable counterpart of [`Scenario::waypoints`], same order.
    pub fn waypoints_mut(&mut self) -> Vec<&mut Waypoint> {
        let mut waypoints = Vec::new();
        for shipment in &mut self.model.shipments {
            for visit in shipment.pickups.iter_mut().chain(shipment.deliveries.iter_mut()) {
                waypoints.extend(visit.arrival_waypoint.as_mut());
                waypoints.extend(visit.departure_waypoint.as_mut());
            }
        }
        for vehicle in &mut self.model.vehicles {
            waypoints.extend(vehicle.start_waypoint.as_mut());
            waypoints.extend(vehicle.end_waypoint.as_mut());
        }
        waypoints
    }

    /// Number of waypoints that reference a place id.
    pub fn place_id_count(&self) -> usize {
        self.waypoints()
            .into_iter()
            .filter(|w| w.place_id().is_some())
            .count()
    }
}

/// A visit performed on a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteVisit {
    #[serde(default, alias = "shipment_index")]
    pub shipment_index: usize,
    #[serde(default, alias = "is_pickup")]
    pub is_pickup: bool,
    #[serde(default, alias = "visit_request_index")]
    pub visit_request_index: usize,
    #[serde(default, alias = "start_time", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Scalar>,
    #[serde(default, alias = "shipment_label", skip_serializing_if = "Option::is_none")]
    pub shipment_label: Option<String>,
}

/// The route of one vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRoute {
    #[serde(default, alias = "vehicle_index")]
    pub vehicle_index: usize,
    #[serde(default, alias = "vehicle_label", skip_serializing_if = "Option::is_none")]
    pub vehicle_label: Option<String>,
    #[serde(default, alias = "vehicle_start_time", skip_serializing_if = "Option::is_none")]
    pub vehicle_start_time: Option<Scalar>,
    #[serde(default, alias = "vehicle_end_time", skip_serializing_if = "Option::is_none")]
    pub vehicle_end_time: Option<Scalar>,
    #[serde(default)]
    pub visits: Vec<RouteVisit>,
    #[serde(default, alias = "route_total_cost", skip_serializing_if = "Option::is_none")]
    pub route_total_cost: Option<f64>,
}

/// A shipment the optimizer could not place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkippedShipment {
    #[serde(default)]
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// An optimizer response for a scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    #[serde(default)]
    pub routes: Vec<ShipmentRoute>,
    #[serde(default, alias = "skipped_shipments")]
    pub skipped_shipments: Vec<SkippedShipment>,
    #[serde(default, alias = "total_cost", skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
}

/// A scenario uploaded together with its solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSolutionPair {
    pub scenario: Scenario,
    pub solution: Solution,
}
