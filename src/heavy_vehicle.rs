//! Heavy-vehicle distance augmentation.
//!
//! When any `Unidades` row is typed `pesado`, the scenario built from the
//! workbook is extended with a duration/distance matrix between the unique
//! origin points (stops and vehicle starts) and the unique destination points
//! (stops and vehicle ends). Otherwise the plain scenario is returned and no
//! network call is made.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

use crate::converters::{build_scenario, BuildError, LocationLookup, LOCATIONS_SHEET, VEHICLES_SHEET};
use crate::domain::Scenario;
use crate::routing::{
    build_duration_distance_matrix, unique_points, DistanceMatrixError, DistanceMatrixSource, Point,
};
use crate::workbook::{CellRange, CellValue, Sheet, Workbook};

/// Vehicle type that triggers augmentation.
pub const HEAVY_VEHICLE_TYPE: &str = "pesado";

/// Where distance-matrix points are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum PointSource {
    /// Every row's coordinate columns.
    #[default]
    Columns,
    /// Fixed A1 ranges of two columns (latitude, longitude).
    FixedRanges,
}

impl FromStr for PointSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "columns" => Ok(PointSource::Columns),
            "fixed_ranges" | "fixed-ranges" | "ranges" => Ok(PointSource::FixedRanges),
            other => Err(format!("unknown point source `{}`", other)),
        }
    }
}

impl TryFrom<String> for PointSource {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Ranges used by [`PointSource::FixedRanges`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRanges {
    /// `Ubicaciones` stop coordinates.
    pub locations: CellRange,
    /// `Unidades` start coordinates.
    pub vehicle_starts: CellRange,
    /// `Unidades` end coordinates.
    pub vehicle_ends: CellRange,
}

impl Default for FixedRanges {
    /// `Ubicaciones!B2:C7`, `Unidades!I2:J5` and `Unidades!K2:L5`.
    fn default() -> Self {
        Self {
            locations: CellRange { start: (1, 1), end: (6, 2) },
            vehicle_starts: CellRange { start: (1, 8), end: (4, 9) },
            vehicle_ends: CellRange { start: (1, 10), end: (4, 11) },
        }
    }
}

/// Options for converting a workbook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionOptions {
    pub location_lookup: LocationLookup,
    pub point_source: PointSource,
    pub ranges: FixedRanges,
}

/// Error type for workbook conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("{sheet}!{range} row {row}: expected a latitude and a longitude")]
    InvalidPoint {
        sheet: &'static str,
        range: CellRange,
        row: usize,
    },
    #[error(transparent)]
    DistanceMatrix(#[from] DistanceMatrixError),
}

/// Point lists extracted from the workbook, in sheet order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSets {
    pub locations: Vec<Point>,
    pub vehicle_starts: Vec<Point>,
    pub vehicle_ends: Vec<Point>,
}

impl PointSets {
    /// Unique union of stops and vehicle starts.
    pub fn origins(&self) -> Vec<Point> {
        let all: Vec<Point> = self.locations.iter().chain(&self.vehicle_starts).copied().collect();
        unique_points(&all)
    }

    /// Unique union of stops and vehicle ends.
    pub fn destinations(&self) -> Vec<Point> {
        let all: Vec<Point> = self.locations.iter().chain(&self.vehicle_ends).copied().collect();
        unique_points(&all)
    }
}

/// Whether any `Unidades` row has `tipo` equal to `pesado`.
pub fn has_heavy_vehicle(workbook: &Workbook) -> Result<bool, BuildError> {
    let vehicles = workbook.sheet(VEHICLES_SHEET)?;
    Ok(vehicles
        .rows()
        .iter()
        .any(|row| row.get("tipo").and_then(CellValue::as_text) == Some(HEAVY_VEHICLE_TYPE)))
}

/// Reads the stop and vehicle coordinates used for the distance matrix.
pub fn extract_points(workbook: &Workbook, options: &ConversionOptions) -> Result<PointSets, ConversionError> {
    let locations = workbook.sheet(LOCATIONS_SHEET).map_err(BuildError::from)?;
    let vehicles = workbook.sheet(VEHICLES_SHEET).map_err(BuildError::from)?;

    match options.point_source {
        PointSource::Columns => Ok(PointSets {
            locations: column_points(locations, LOCATIONS_SHEET, "latitude", "longitude")?,
            vehicle_starts: column_points(vehicles, VEHICLES_SHEET, "latitude_salida", "longitude_salida")?,
            vehicle_ends: column_points(vehicles, VEHICLES_SHEET, "latitude_llegada", "longitude_llegada")?,
        }),
        PointSource::FixedRanges => Ok(PointSets {
            locations: range_points(locations, LOCATIONS_SHEET, options.ranges.locations)?,
            vehicle_starts: range_points(vehicles, VEHICLES_SHEET, options.ranges.vehicle_starts)?,
            vehicle_ends: range_points(vehicles, VEHICLES_SHEET, options.ranges.vehicle_ends)?,
        }),
    }
}

fn column_points(
    sheet: &Sheet,
    name: &'static str,
    lat: &'static str,
    lng: &'static str,
) -> Result<Vec<Point>, BuildError> {
    sheet
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let coordinate = |column: &'static str| {
                let cell = row.get(column).ok_or(BuildError::MissingField { sheet: name, row: i + 1, column })?;
                cell.as_f64().ok_or_else(|| BuildError::InvalidField {
                    sheet: name,
                    row: i + 1,
                    column,
                    expected: "a number",
                    value: cell.to_string(),
                })
            };
            Ok(Point::new(coordinate(lat)?, coordinate(lng)?))
        })
        .collect()
}

fn range_points(sheet: &Sheet, name: &'static str, range: CellRange) -> Result<Vec<Point>, ConversionError> {
    sheet
        .block(&range)
        .iter()
        .enumerate()
        .map(|(i, cells)| match cells.as_slice() {
            [lat, lng, ..] => match (lat.as_f64(), lng.as_f64()) {
                (Some(lat), Some(lng)) => Ok(Point::new(lat, lng)),
                _ => Err(ConversionError::InvalidPoint { sheet: name, range, row: i + 1 }),
            },
            _ => Err(ConversionError::InvalidPoint { sheet: name, range, row: i + 1 }),
        })
        .collect()
}

/// Converts a workbook into a scenario, augmenting it when a heavy vehicle
/// is present.
///
/// The plain scenario is built first, so structural errors surface before
/// any network call.
pub async fn convert_workbook(
    workbook: &Workbook,
    source: &dyn DistanceMatrixSource,
    options: &ConversionOptions,
) -> Result<Scenario, ConversionError> {
    let heavy = has_heavy_vehicle(workbook)?;
    let mut scenario = build_scenario(workbook, options.location_lookup)?;
    if !heavy {
        return Ok(scenario);
    }

    let points = extract_points(workbook, options)?;
    let origins = points.origins();
    let destinations = points.destinations();
    info!(
        origins = origins.len(),
        destinations = destinations.len(),
        point_source = ?options.point_source,
        "Heavy vehicle present, fetching distance matrix"
    );

    let response = source.fetch(&origins, &destinations).await?;
    let matrix = build_duration_distance_matrix(&response, origins.len(), destinations.len())?;

    if response.origin_addresses.len() != origins.len()
        || response.destination_addresses.len() != destinations.len()
    {
        return Err(DistanceMatrixError::Malformed(format!(
            "expected {} origin and {} destination addresses, got {} and {}",
            origins.len(),
            destinations.len(),
            response.origin_addresses.len(),
            response.destination_addresses.len()
        ))
        .into());
    }

    scenario.duration_distance_matrices = vec![matrix];
    scenario.duration_distance_matrix_src_tags = vec![response.origin_addresses];
    scenario.duration_distance_matrix_dst_tags = vec![response.destination_addresses];
    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::SHIPMENTS_SHEET;
    use crate::demo_data::{generate_cdmx, generate_cdmx_heavy};
    use crate::routing::{DistanceMatrixResponse, ResponseElement, ResponseRow, Measure};
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers with `meters = 100 * i + j` and `seconds = 10 * i + j`.
    #[derive(Default)]
    struct FakeMatrix {
        calls: AtomicUsize,
        fail: bool,
    }

    impl DistanceMatrixSource for FakeMatrix {
        fn fetch<'a>(
            &'a self,
            origins: &'a [Point],
            destinations: &'a [Point],
        ) -> BoxFuture<'a, Result<DistanceMatrixResponse, DistanceMatrixError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if self.fail {
                    return Err(DistanceMatrixError::Network("connection refused".into()));
                }
                let rows = (0..origins.len())
                    .map(|i| ResponseRow {
                        elements: (0..destinations.len())
                            .map(|j| ResponseElement {
                                status: Some("OK".into()),
                                distance: Some(Measure { value: Some((100 * i + j) as f64) }),
                                duration: Some(Measure { value: Some((10 * i + j) as f64) }),
                            })
                            .collect(),
                    })
                    .collect();
                Ok(DistanceMatrixResponse {
                    status: Some("OK".into()),
                    error_message: None,
                    origin_addresses: origins.iter().map(Point::key).collect(),
                    destination_addresses: destinations.iter().map(Point::key).collect(),
                    rows,
                })
            })
        }
    }

    #[tokio::test]
    async fn test_light_fleet_makes_no_call() {
        let workbook = generate_cdmx();
        let source = FakeMatrix::default();
        let options = ConversionOptions::default();

        let scenario = convert_workbook(&workbook, &source, &options).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(scenario, build_scenario(&workbook, options.location_lookup).unwrap());
    }

    #[tokio::test]
    async fn test_heavy_fleet_matrix_dimensions() {
        let workbook = generate_cdmx_heavy();
        let source = FakeMatrix::default();
        let options = ConversionOptions::default();

        let points = extract_points(&workbook, &options).unwrap();
        let scenario = convert_workbook(&workbook, &source, &options).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let matrix = &scenario.duration_distance_matrices[0];
        assert_eq!(scenario.duration_distance_matrices.len(), 1);
        assert_eq!(matrix.row_count(), points.origins().len());
        assert_eq!(matrix.column_count(), points.destinations().len());
        assert_eq!(matrix.rows[1].meters[2], 102);
        assert_eq!(matrix.rows[1].durations[2], 12);
        assert_eq!(scenario.duration_distance_matrix_src_tags[0].len(), matrix.row_count());
        assert_eq!(scenario.duration_distance_matrix_dst_tags[0].len(), matrix.column_count());
    }

    #[tokio::test]
    async fn test_heavy_output_keeps_plain_fields() {
        let workbook = generate_cdmx_heavy();
        let options = ConversionOptions::default();
        let scenario = convert_workbook(&workbook, &FakeMatrix::default(), &options).await.unwrap();

        let plain = build_scenario(&workbook, options.location_lookup).unwrap();
        assert_eq!(scenario.model, plain.model);

        let json = serde_json::to_value(&scenario).unwrap();
        assert!(json["model"].is_object());
        assert_eq!(json["duration_distance_matrices"][0]["rows"][0]["meters"][0], json!(0));
        assert_eq!(json["duration_distance_matrix_src_tags"][0][0], json!("19.4326,-99.1332"));
    }

    #[test]
    fn test_demo_points_dedup() {
        let points = extract_points(&generate_cdmx_heavy(), &ConversionOptions::default()).unwrap();
        assert_eq!(points.locations.len(), 6);
        // Vallejo and Central de Abasto start the four vehicles.
        assert_eq!(points.origins().len(), 8);
        // Ligero 3 ends at the first stop, which is already counted.
        assert_eq!(points.destinations().len(), 8);
    }

    #[test]
    fn test_fixed_ranges_match_columns_for_demo() {
        let workbook = generate_cdmx_heavy();
        let columns = extract_points(&workbook, &ConversionOptions::default()).unwrap();
        let ranges = extract_points(
            &workbook,
            &ConversionOptions { point_source: PointSource::FixedRanges, ..Default::default() },
        )
        .unwrap();
        assert_eq!(columns, ranges);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_distinct() {
        let source = FakeMatrix { fail: true, ..Default::default() };
        let err = convert_workbook(&generate_cdmx_heavy(), &source, &ConversionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::DistanceMatrix(DistanceMatrixError::Network(_))));
    }

    #[tokio::test]
    async fn test_structural_error_before_fetch() {
        let workbook = generate_cdmx_heavy();
        let broken = Workbook::new(
            workbook
                .sheet_names()
                .filter(|name| *name != SHIPMENTS_SHEET)
                .map(|name| workbook.sheet(name).unwrap().clone())
                .collect(),
        );
        let source = FakeMatrix::default();
        let err = convert_workbook(&broken, &source, &ConversionOptions::default()).await.unwrap_err();
        assert!(matches!(err, ConversionError::Build(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_heavy_flag_is_exact() {
        let vehicles = Sheet::new(
            VEHICLES_SHEET,
            vec![vec!["tipo".into()], vec!["Pesado".into()], vec!["pesado ".into()]],
        );
        assert!(!has_heavy_vehicle(&Workbook::new(vec![vehicles])).unwrap());
    }

    #[test]
    fn test_invalid_fixed_range_point() {
        let locations = Sheet::new(
            LOCATIONS_SHEET,
            vec![
                vec!["id".into(), "latitude".into(), "longitude".into()],
                vec![0.0.into(), 19.4.into(), "oeste".into()],
            ],
        );
        let vehicles = Sheet::new(VEHICLES_SHEET, vec![vec!["tipo".into()]]);
        let options = ConversionOptions { point_source: PointSource::FixedRanges, ..Default::default() };
        let err = extract_points(&Workbook::new(vec![locations, vehicles]), &options).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidPoint { sheet: LOCATIONS_SHEET, row: 1, .. }));
    }

    #[test]
    fn test_default_ranges() {
        let ranges = FixedRanges::default();
        assert_eq!(ranges.locations.to_string(), "B2:C7");
        assert_eq!(ranges.vehicle_starts.to_string(), "I2:J5");
        assert_eq!(ranges.vehicle_ends.to_string(), "K2:L5");
    }
}
