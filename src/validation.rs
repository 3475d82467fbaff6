//! Upload validation.
//!
//! JSON documents are checked once here and turned into typed
//! [`Scenario`] / [`Solution`] values. Errors carry the JSON path of the
//! first violated rule, e.g. `model.shipments[2].deliveries[0]`.

use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::io::{Cursor, Read};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::domain::{
    json_kind, LatLng, Load, Scalar, Scenario, ScenarioSolutionPair, Shipment, Solution,
    TimeWindow, Vehicle, VisitRequest, Waypoint,
};

pub const SCENARIO_FILE: &str = "scenario.json";
pub const SOLUTION_FILE: &str = "solution.json";

/// Largest decompressed size read from one archive entry.
pub const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

const ROOT: &str = "(root)";

/// The first structural rule a document violates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {rule}")]
pub struct ValidationError {
    pub path: String,
    pub rule: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, rule: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            path: if path.is_empty() { ROOT.to_string() } else { path },
            rule: rule.into(),
        }
    }
}

/// Error type for archive uploads.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("not a readable zip archive: {0}")]
    Zip(#[from] ZipError),
    #[error("failed to read archive entry: {0}")]
    Io(#[from] std::io::Error),
    #[error("{file} is larger than {limit} bytes")]
    EntryTooLarge { file: &'static str, limit: u64 },
    #[error("Missing {0}")]
    MissingEntry(&'static str),
    #[error("Incorrect number of files: expected 2, found {0}")]
    IncorrectCount(usize),
    #[error("{file} is not valid JSON: {message}")]
    InvalidJson { file: &'static str, message: String },
    #[error("{file}: {error}")]
    Invalid {
        file: &'static str,
        #[source]
        error: ValidationError,
    },
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn index(path: &str, i: usize) -> String {
    format!("{}[{}]", path, i)
}

fn parse<T: DeserializeOwned>(value: Value, path: &str) -> Result<T, ValidationError> {
    serde_json::from_value(value).map_err(|e| ValidationError::new(path, e.to_string()))
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ValidationError> {
    value.as_object().ok_or_else(|| {
        ValidationError::new(path, format!("must be an object, got {}", json_kind(value)))
    })
}

/// Looks up the first present key among camelCase/snake_case spellings.
fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<(&'a str, &'a Value)> {
    names
        .iter()
        .find_map(|name| object.get_key_value(*name))
        .map(|(k, v)| (k.as_str(), v))
}

/// Parses each element of an optional array field on its own, so errors
/// name the element.
fn parse_elements<T: DeserializeOwned>(
    object: &Map<String, Value>,
    names: &[&str],
    path: &str,
) -> Result<Vec<T>, ValidationError> {
    let Some((key, value)) = field(object, names) else {
        return Ok(Vec::new());
    };
    let path = child(path, key);
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse(item.clone(), &index(&path, i)))
            .collect(),
        other => Err(ValidationError::new(
            path,
            format!("must be an array, got {}", json_kind(other)),
        )),
    }
}

/// Returns `object` without the given keys.
fn without(object: &Map<String, Value>, names: &[&str]) -> Value {
    Value::Object(
        object
            .iter()
            .filter(|(k, _)| !names.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

// ============================================================================
// Scenario
// ============================================================================

const SHIPMENTS: &[&str] = &["shipments"];
const VEHICLES: &[&str] = &["vehicles"];

/// Validates a scenario document and converts it to a [`Scenario`].
///
/// # Examples
///
/// ```
/// use fleet_routing_uploads::validation::validate_scenario;
///
/// let ok = serde_json::json!({"model": {"shipments": [
///     {"deliveries": [{"arrivalLocation": {"latitude": 19.4, "longitude": -99.1}}]}
/// ]}});
/// assert_eq!(validate_scenario(&ok).unwrap().model.shipments.len(), 1);
///
/// let bad = serde_json::json!({"model": {"shipments": [{"deliveries": []}]}});
/// let err = validate_scenario(&bad).unwrap_err();
/// assert_eq!(err.path, "model.shipments[0]");
/// ```
pub fn validate_scenario(value: &Value) -> Result<Scenario, ValidationError> {
    let root = as_object(value, "")?;
    let model_value = root
        .get("model")
        .ok_or_else(|| ValidationError::new("model", "is required"))?;
    let model = as_object(model_value, "model")?;

    let shipments: Vec<Shipment> = parse_elements(model, SHIPMENTS, "model")?;
    let vehicles: Vec<Vehicle> = parse_elements(model, VEHICLES, "model")?;

    let mut rest = root.clone();
    rest.insert("model".to_string(), without(model, &["shipments", "vehicles"]));
    let mut scenario: Scenario = parse(Value::Object(rest), "")?;
    scenario.model.shipments = shipments;
    scenario.model.vehicles = vehicles;

    check_scenario(&scenario)?;
    debug!(
        shipments = scenario.model.shipments.len(),
        vehicles = scenario.model.vehicles.len(),
        "Scenario validated"
    );
    Ok(scenario)
}

/// Applies the structural rules to a typed scenario.
pub fn check_scenario(scenario: &Scenario) -> Result<(), ValidationError> {
    let model = &scenario.model;
    check_bounds(
        model.global_start_time.as_ref(),
        model.global_end_time.as_ref(),
        "model",
        "global_start_time must not be after global_end_time",
    )?;

    for (i, shipment) in model.shipments.iter().enumerate() {
        let path = index("model.shipments", i);
        if shipment.pickups.is_empty() && shipment.deliveries.is_empty() {
            return Err(ValidationError::new(path, "must have at least one pickup or delivery"));
        }
        check_loads(&shipment.demands, &child(&path, "demands"))?;
        for (j, visit) in shipment.pickups.iter().enumerate() {
            check_visit(visit, &index(&child(&path, "pickups"), j))?;
        }
        for (j, visit) in shipment.deliveries.iter().enumerate() {
            check_visit(visit, &index(&child(&path, "deliveries"), j))?;
        }
    }

    for (i, vehicle) in model.vehicles.iter().enumerate() {
        let path = index("model.vehicles", i);
        check_endpoint(
            vehicle.start_location.as_ref(),
            vehicle.start_waypoint.as_ref(),
            &path,
            ("startLocation", "startWaypoint"),
            false,
        )?;
        check_endpoint(
            vehicle.end_location.as_ref(),
            vehicle.end_waypoint.as_ref(),
            &path,
            ("endLocation", "endWaypoint"),
            false,
        )?;
        check_loads(&vehicle.capacities, &child(&path, "capacities"))?;
        check_cost(vehicle.cost_per_hour, &child(&path, "costPerHour"))?;
        check_cost(vehicle.cost_per_kilometer, &child(&path, "costPerKilometer"))?;
    }

    check_matrices(scenario)
}

fn check_visit(visit: &VisitRequest, path: &str) -> Result<(), ValidationError> {
    check_endpoint(
        visit.arrival_location.as_ref(),
        visit.arrival_waypoint.as_ref(),
        path,
        ("arrivalLocation", "arrivalWaypoint"),
        true,
    )?;
    check_endpoint(
        visit.departure_location.as_ref(),
        visit.departure_waypoint.as_ref(),
        path,
        ("departureLocation", "departureWaypoint"),
        false,
    )?;
    for (k, window) in visit.time_windows.iter().enumerate() {
        check_time_window(window, &index(&child(path, "timeWindows"), k))?;
    }
    if let Some(duration) = visit.duration {
        if duration.seconds < 0 || duration.nanos < 0 {
            return Err(ValidationError::new(child(path, "duration"), "must not be negative"));
        }
    }
    Ok(())
}

/// A location and a waypoint are mutually exclusive; `required` demands one.
fn check_endpoint(
    location: Option<&LatLng>,
    waypoint: Option<&Waypoint>,
    path: &str,
    (location_key, waypoint_key): (&str, &str),
    required: bool,
) -> Result<(), ValidationError> {
    match (location, waypoint) {
        (Some(_), Some(_)) => Err(ValidationError::new(
            path,
            format!("{} and {} are mutually exclusive", location_key, waypoint_key),
        )),
        (None, None) if required => Err(ValidationError::new(
            path,
            format!("requires {} or {}", location_key, waypoint_key),
        )),
        (Some(lat_lng), None) => check_lat_lng(lat_lng, &child(path, location_key)),
        (None, Some(waypoint)) => check_waypoint(waypoint, &child(path, waypoint_key)),
        (None, None) => Ok(()),
    }
}

/// A waypoint needs a coordinate or a place id. Resolved waypoints keep both.
fn check_waypoint(waypoint: &Waypoint, path: &str) -> Result<(), ValidationError> {
    match waypoint.lat_lng() {
        Some(lat_lng) => check_lat_lng(&lat_lng, &child(&child(path, "location"), "latLng")),
        None if waypoint.place_id().is_some() => Ok(()),
        None => Err(ValidationError::new(path, "requires location.latLng or placeId")),
    }
}

fn check_lat_lng(lat_lng: &LatLng, path: &str) -> Result<(), ValidationError> {
    if !(-90.0..=90.0).contains(&lat_lng.latitude) {
        return Err(ValidationError::new(
            child(path, "latitude"),
            format!("{} is outside [-90, 90]", lat_lng.latitude),
        ));
    }
    if !(-180.0..=180.0).contains(&lat_lng.longitude) {
        return Err(ValidationError::new(
            child(path, "longitude"),
            format!("{} is outside [-180, 180]", lat_lng.longitude),
        ));
    }
    Ok(())
}

fn check_loads(loads: &[Load], path: &str) -> Result<(), ValidationError> {
    for (i, load) in loads.iter().enumerate() {
        if load.value.trim().parse::<i64>().is_err() {
            return Err(ValidationError::new(
                child(&index(path, i), "value"),
                format!("`{}` is not an int64", load.value),
            ));
        }
    }
    Ok(())
}

fn check_cost(cost: Option<f64>, path: &str) -> Result<(), ValidationError> {
    match cost {
        Some(c) if c.is_nan() || c < 0.0 => Err(ValidationError::new(path, "must not be negative")),
        _ => Ok(()),
    }
}

fn check_time_window(window: &TimeWindow, path: &str) -> Result<(), ValidationError> {
    check_bounds(
        window.start_time.as_ref(),
        window.end_time.as_ref(),
        path,
        "start_time must not be after end_time",
    )
}

/// Compares bounds that are both numbers or both RFC 3339 timestamps.
fn check_bounds(
    start: Option<&Scalar>,
    end: Option<&Scalar>,
    path: &str,
    rule: &str,
) -> Result<(), ValidationError> {
    let ordered = match (start, end) {
        (Some(Scalar::Text(a)), Some(Scalar::Text(b))) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a <= b,
                _ => true,
            }
        }
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a <= b,
            _ => true,
        },
        _ => true,
    };
    if ordered {
        Ok(())
    } else {
        Err(ValidationError::new(path, rule))
    }
}

fn check_matrices(scenario: &Scenario) -> Result<(), ValidationError> {
    for (k, matrix) in scenario.duration_distance_matrices.iter().enumerate() {
        let path = index("duration_distance_matrices", k);
        let columns = matrix.rows.first().map(|r| r.durations.len());
        for (i, row) in matrix.rows.iter().enumerate() {
            if row.durations.len() != row.meters.len() || Some(row.durations.len()) != columns {
                return Err(ValidationError::new(
                    index(&child(&path, "rows"), i),
                    "durations and meters must have one entry per destination",
                ));
            }
        }
        if let Some(tags) = scenario.duration_distance_matrix_src_tags.get(k) {
            if tags.len() != matrix.row_count() {
                return Err(ValidationError::new(
                    index("duration_distance_matrix_src_tags", k),
                    format!("expected {} tags, got {}", matrix.row_count(), tags.len()),
                ));
            }
        }
        if let Some(tags) = scenario.duration_distance_matrix_dst_tags.get(k) {
            if tags.len() != matrix.column_count() {
                return Err(ValidationError::new(
                    index("duration_distance_matrix_dst_tags", k),
                    format!("expected {} tags, got {}", matrix.column_count(), tags.len()),
                ));
            }
        }
    }
    Ok(())
}

// ============================================================================
// Solution
// ============================================================================

/// Validates a solution document and converts it to a [`Solution`].
pub fn validate_solution(value: &Value) -> Result<Solution, ValidationError> {
    let root = as_object(value, "")?;
    let routes = parse_elements(root, &["routes"], "")?;
    let mut solution: Solution = parse(without(root, &["routes"]), "")?;
    solution.routes = routes;

    for (i, route) in solution.routes.iter().enumerate() {
        check_cost(route.route_total_cost, &child(&index("routes", i), "routeTotalCost"))?;
    }
    check_cost(solution.total_cost, "totalCost")?;
    Ok(solution)
}

/// Checks that every index in the solution refers into the scenario.
pub fn validate_pair(scenario: &Scenario, solution: &Solution) -> Result<(), ValidationError> {
    let shipments = &scenario.model.shipments;
    let vehicle_count = scenario.model.vehicles.len();

    for (i, route) in solution.routes.iter().enumerate() {
        let path = index("routes", i);
        if route.vehicle_index >= vehicle_count {
            return Err(ValidationError::new(
                child(&path, "vehicleIndex"),
                format!("vehicle {} does not exist ({} vehicles)", route.vehicle_index, vehicle_count),
            ));
        }
        for (j, visit) in route.visits.iter().enumerate() {
            let path = index(&child(&path, "visits"), j);
            let shipment = shipments.get(visit.shipment_index).ok_or_else(|| {
                ValidationError::new(
                    child(&path, "shipmentIndex"),
                    format!("shipment {} does not exist", visit.shipment_index),
                )
            })?;
            let requests = if visit.is_pickup {
                shipment.pickups.len()
            } else {
                shipment.deliveries.len()
            };
            if visit.visit_request_index >= requests {
                return Err(ValidationError::new(
                    child(&path, "visitRequestIndex"),
                    format!(
                        "{} {} does not exist",
                        if visit.is_pickup { "pickup" } else { "delivery" },
                        visit.visit_request_index
                    ),
                ));
            }
        }
    }

    for (i, skipped) in solution.skipped_shipments.iter().enumerate() {
        if skipped.index >= shipments.len() {
            return Err(ValidationError::new(
                child(&index("skippedShipments", i), "index"),
                format!("shipment {} does not exist", skipped.index),
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Archive
// ============================================================================

/// Whether the bytes start with a zip local file header.
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04")
}

/// Final path component of an archive entry name.
fn root_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Loads a `scenario.json` + `solution.json` archive.
///
/// Directory entries are ignored and entries are matched on their final path
/// component. A missing entry is reported before a wrong entry count.
pub fn load_archive(bytes: &[u8]) -> Result<ScenarioSolutionPair, ArchiveError> {
    load_archive_limited(bytes, MAX_ENTRY_BYTES)
}

fn load_archive_limited(bytes: &[u8], entry_limit: u64) -> Result<ScenarioSolutionPair, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut file_count = 0;
    let mut scenario_text = None;
    let mut solution_text = None;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        file_count += 1;
        let (file, slot) = match root_name(entry.name()) {
            SCENARIO_FILE => (SCENARIO_FILE, &mut scenario_text),
            SOLUTION_FILE => (SOLUTION_FILE, &mut solution_text),
            _ => continue,
        };
        let too_large = ArchiveError::EntryTooLarge { file, limit: entry_limit };
        if entry.size() > entry_limit {
            return Err(too_large);
        }
        // Declared sizes are untrusted.
        let mut text = String::new();
        (&mut entry).take(entry_limit + 1).read_to_string(&mut text)?;
        if text.len() as u64 > entry_limit {
            return Err(too_large);
        }
        *slot = Some(text);
    }
    debug!(files = file_count, "Read archive entries");

    let scenario_text = scenario_text.ok_or(ArchiveError::MissingEntry(SCENARIO_FILE))?;
    let solution_text = solution_text.ok_or(ArchiveError::MissingEntry(SOLUTION_FILE))?;
    if file_count != 2 {
        return Err(ArchiveError::IncorrectCount(file_count));
    }

    let scenario = validate_entry(SCENARIO_FILE, &scenario_text, validate_scenario)?;
    let solution = validate_entry(SOLUTION_FILE, &solution_text, validate_solution)?;
    validate_pair(&scenario, &solution)
        .map_err(|error| ArchiveError::Invalid { file: SOLUTION_FILE, error })?;

    Ok(ScenarioSolutionPair { scenario, solution })
}

fn validate_entry<T>(
    file: &'static str,
    text: &str,
    validate: impl Fn(&Value) -> Result<T, ValidationError>,
) -> Result<T, ArchiveError> {
    let value: Value = serde_json::from_str(text).map_err(|e| ArchiveError::InvalidJson {
        file,
        message: e.to_string(),
    })?;
    validate(&value).map_err(|error| ArchiveError::Invalid { file, error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn scenario_json() -> Value {
        json!({
            "model": {
                "globalStartTime": "2024-05-06T07:00:00Z",
                "globalEndTime": "2024-05-06T20:00:00Z",
                "shipments": [
                    {
                        "demands": [{"type": "weight_kilograms", "value": "120"}],
                        "deliveries": [{
                            "arrivalLocation": {"latitude": 19.43, "longitude": -99.13},
                            "timeWindows": [{"startTime": "2024-05-06T09:00:00Z", "endTime": "2024-05-06T12:00:00Z"}],
                            "duration": "600s"
                        }]
                    },
                    {
                        "pickups": [{"arrivalWaypoint": {"placeId": "ChIJabc"}}],
                        "deliveries": [{"arrivalWaypoint": {"location": {"latLng": {"latitude": 19.35, "longitude": -99.16}}}}]
                    }
                ],
                "vehicles": [{"startLocation": {"latitude": 19.49, "longitude": -99.15}, "costPerHour": 180}]
            }
        })
    }

    fn solution_json() -> Value {
        json!({
            "routes": [{
                "vehicleIndex": 0,
                "visits": [
                    {"shipmentIndex": 0, "visitRequestIndex": 0},
                    {"shipmentIndex": 1, "isPickup": true},
                    {"shipmentIndex": 1}
                ]
            }],
            "totalCost": 512.5
        })
    }

    fn rule_violation(value: Value) -> ValidationError {
        validate_scenario(&value).unwrap_err()
    }

    fn zip_with(entries: &[(&str, Option<String>)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            match content {
                Some(text) => {
                    writer.start_file(*name, options).unwrap();
                    writer.write_all(text.as_bytes()).unwrap();
                }
                None => writer.add_directory(*name, options).unwrap(),
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_valid_scenario() {
        let scenario = validate_scenario(&scenario_json()).unwrap();
        assert_eq!(scenario.model.shipments.len(), 2);
        assert_eq!(scenario.model.shipments[0].deliveries[0].duration.unwrap().seconds, 600);
        assert_eq!(scenario.place_id_count(), 1);
    }

    #[test]
    fn test_root_and_model_must_be_objects() {
        assert_eq!(rule_violation(json!([])).path, ROOT);
        assert_eq!(rule_violation(json!({})).path, "model");
        assert_eq!(rule_violation(json!({"model": 3})).rule, "must be an object, got number");
    }

    #[test]
    fn test_type_error_names_element() {
        let mut value = scenario_json();
        value["model"]["vehicles"][0]["costPerHour"] = json!("cheap");
        let err = rule_violation(value);
        assert_eq!(err.path, "model.vehicles[0]");
    }

    #[test]
    fn test_shipments_must_be_array() {
        let err = rule_violation(json!({"model": {"shipments": {}}}));
        assert_eq!(err, ValidationError::new("model.shipments", "must be an array, got object"));
    }

    #[test]
    fn test_location_and_waypoint_are_exclusive() {
        let mut value = scenario_json();
        value["model"]["shipments"][0]["deliveries"][0]["arrivalWaypoint"] = json!({"placeId": "x"});
        let err = rule_violation(value);
        assert_eq!(err.path, "model.shipments[0].deliveries[0]");
        assert!(err.rule.contains("mutually exclusive"));
    }

    #[test]
    fn test_waypoint_needs_location_or_place_id() {
        let mut value = scenario_json();
        value["model"]["shipments"][1]["pickups"][0]["arrivalWaypoint"] = json!({"sideOfRoad": true});
        let err = rule_violation(value);
        assert_eq!(err.path, "model.shipments[1].pickups[0].arrivalWaypoint");
    }

    #[test]
    fn test_latitude_range() {
        let mut value = scenario_json();
        value["model"]["vehicles"][0]["startLocation"]["latitude"] = json!(91.0);
        let err = rule_violation(value);
        assert_eq!(err.path, "model.vehicles[0].startLocation.latitude");
    }

    #[test]
    fn test_load_value_must_be_int64() {
        let mut value = scenario_json();
        value["model"]["shipments"][0]["demands"][0]["value"] = json!("12.5");
        let err = rule_violation(value);
        assert_eq!(err.path, "model.shipments[0].demands[0].value");
    }

    #[test]
    fn test_time_window_order() {
        let mut value = scenario_json();
        value["model"]["shipments"][0]["deliveries"][0]["timeWindows"][0]["endTime"] =
            json!("2024-05-06T08:00:00Z");
        let err = rule_violation(value);
        assert_eq!(err.path, "model.shipments[0].deliveries[0].timeWindows[0]");
    }

    #[test]
    fn test_negative_cost() {
        let mut value = scenario_json();
        value["model"]["vehicles"][0]["costPerHour"] = json!(-1);
        let err = rule_violation(value);
        assert_eq!(err.path, "model.vehicles[0].costPerHour");
    }

    #[test]
    fn test_matrix_tag_count() {
        let mut value = scenario_json();
        value["duration_distance_matrices"] = json!([{"rows": [{"durations": [0, 5], "meters": [0, 9]}]}]);
        value["duration_distance_matrix_src_tags"] = json!([["a", "b"]]);
        let err = rule_violation(value);
        assert_eq!(err.path, "duration_distance_matrix_src_tags[0]");
    }

    #[test]
    fn test_pair_indices() {
        let scenario = validate_scenario(&scenario_json()).unwrap();
        let solution = validate_solution(&solution_json()).unwrap();
        assert!(validate_pair(&scenario, &solution).is_ok());

        let mut bad = solution_json();
        bad["routes"][0]["visits"][1]["visitRequestIndex"] = json!(1);
        let solution = validate_solution(&bad).unwrap();
        let err = validate_pair(&scenario, &solution).unwrap_err();
        assert_eq!(err.path, "routes[0].visits[1].visitRequestIndex");
    }

    #[test]
    fn test_archive_with_both_entries() {
        let bytes = zip_with(&[
            ("upload/", None),
            ("upload/scenario.json", Some(scenario_json().to_string())),
            ("upload/solution.json", Some(solution_json().to_string())),
        ]);
        assert!(is_zip(&bytes));
        let pair = load_archive(&bytes).unwrap();
        assert_eq!(pair.solution.routes[0].visits.len(), 3);
    }

    #[test]
    fn test_archive_missing_entry() {
        let bytes = zip_with(&[("scenario.json", Some(scenario_json().to_string()))]);
        let err = load_archive(&bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::MissingEntry(SOLUTION_FILE)));
        assert_eq!(err.to_string(), "Missing solution.json");

        let bytes = zip_with(&[("solution.json", Some(solution_json().to_string()))]);
        assert!(matches!(load_archive(&bytes).unwrap_err(), ArchiveError::MissingEntry(SCENARIO_FILE)));
    }

    #[test]
    fn test_archive_incorrect_count() {
        let bytes = zip_with(&[
            ("scenario.json", Some(scenario_json().to_string())),
            ("solution.json", Some(solution_json().to_string())),
            ("notes.txt", Some("hello".into())),
        ]);
        assert!(matches!(load_archive(&bytes).unwrap_err(), ArchiveError::IncorrectCount(3)));
    }

    #[test]
    fn test_archive_invalid_entry_json() {
        let bytes = zip_with(&[
            ("scenario.json", Some("{not json".into())),
            ("solution.json", Some(solution_json().to_string())),
        ]);
        let err = load_archive(&bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidJson { file: SCENARIO_FILE, .. }));
    }

    #[test]
    fn test_archive_entry_size_is_capped() {
        let bytes = zip_with(&[
            ("scenario.json", Some(scenario_json().to_string())),
            ("solution.json", Some(solution_json().to_string())),
        ]);
        let err = load_archive_limited(&bytes, 32).unwrap_err();
        assert!(matches!(err, ArchiveError::EntryTooLarge { file: SCENARIO_FILE, limit: 32 }));
        assert!(load_archive_limited(&bytes, MAX_ENTRY_BYTES).is_ok());
    }

    #[test]
    fn test_not_an_archive() {
        assert!(matches!(load_archive(b"plain text").unwrap_err(), ArchiveError::Zip(_)));
    }
}
