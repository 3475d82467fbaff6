//! Converts planner workbooks into routing scenarios.
//!
//! The workbook carries five sheets:
//!
//! | Sheet | Columns |
//! |---|---|
//! | `Modelo` | `global_start`, `global_end` |
//! | `Shipments` | `id`, `demanda`, `time_service`, optional `id_ubicacion` |
//! | `Ubicaciones` | `latitude`, `longitude`, `id` (id-keyed lookup only) |
//! | `TimeWindows` | `id_shipment`, `start_time_window`, `end_time_window` |
//! | `Unidades` | `latitude_salida`, `longitude_salida`, `latitude_llegada`, `longitude_llegada`, `capacidad_peso`, `costo_hora`, `costo_km`, `tipo` |
//!
//! Every shipment becomes one delivery; every vehicle row becomes one vehicle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::{
    LatLng, Load, Scalar, Scenario, ServiceDuration, Shipment, ShipmentModel, TimeWindow, Vehicle,
    VisitRequest,
};
use crate::workbook::{CellValue, Row, Sheet, Workbook, WorkbookError, DATETIME_FORMAT};

pub const MODEL_SHEET: &str = "Modelo";
pub const SHIPMENTS_SHEET: &str = "Shipments";
pub const LOCATIONS_SHEET: &str = "Ubicaciones";
pub const TIME_WINDOWS_SHEET: &str = "TimeWindows";
pub const VEHICLES_SHEET: &str = "Unidades";

/// Shipment column naming the referenced location; `id` is used when the
/// header lacks it. A present column is required on every shipment row.
pub const LOCATION_REFERENCE_COLUMN: &str = "id_ubicacion";

/// How a shipment's location reference is matched to a `Ubicaciones` row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum LocationLookup {
    /// The reference is the zero-based data row index.
    #[default]
    Positional,
    /// The reference matches the `id` column.
    ById,
}

impl FromStr for LocationLookup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positional" => Ok(LocationLookup::Positional),
            "by_id" | "by-id" | "id" => Ok(LocationLookup::ById),
            other => Err(format!("unknown location lookup `{}`", other)),
        }
    }
}

impl TryFrom<String> for LocationLookup {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Error type for scenario building.
///
/// Row numbers are one-based data rows (the header row is not counted).
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BuildError {
    #[error(transparent)]
    Workbook(#[from] WorkbookError),
    #[error("sheet `{0}` has no data rows")]
    EmptySheet(&'static str),
    #[error("{sheet} row {row}: missing `{column}`")]
    MissingField {
        sheet: &'static str,
        row: usize,
        column: &'static str,
    },
    #[error("{sheet} row {row}: `{column}` must be {expected}, got `{value}`")]
    InvalidField {
        sheet: &'static str,
        row: usize,
        column: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("Shipments row {row}: no location `{reference}` in Ubicaciones")]
    MissingLocation { row: usize, reference: String },
    #[error("Ubicaciones row {row}: duplicate location id `{id}`")]
    DuplicateLocationId { row: usize, id: String },
}

impl BuildError {
    /// Whether the error comes from unreadable bytes rather than sheet content.
    pub fn is_format_error(&self) -> bool {
        matches!(self, BuildError::Workbook(WorkbookError::Format(_)))
    }
}

/// A row under a named sheet, for field access with located errors.
struct SheetRow<'a> {
    sheet: &'static str,
    index: usize,
    row: &'a Row,
}

impl<'a> SheetRow<'a> {
    fn all(sheet: &'a Sheet, name: &'static str) -> impl Iterator<Item = SheetRow<'a>> {
        sheet.rows().iter().enumerate().map(move |(index, row)| SheetRow {
            sheet: name,
            index,
            row,
        })
    }

    fn number(&self) -> usize {
        self.index + 1
    }

    fn required(&self, column: &'static str) -> Result<&'a CellValue, BuildError> {
        self.row.get(column).ok_or(BuildError::MissingField {
            sheet: self.sheet,
            row: self.number(),
            column,
        })
    }

    fn invalid(&self, column: &'static str, expected: &'static str, value: &CellValue) -> BuildError {
        BuildError::InvalidField {
            sheet: self.sheet,
            row: self.number(),
            column,
            expected,
            value: value.to_string(),
        }
    }

    fn float(&self, column: &'static str) -> Result<f64, BuildError> {
        let cell = self.required(column)?;
        cell.as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| self.invalid(column, "a number", cell))
    }

    fn whole_seconds(&self, column: &'static str) -> Result<i64, BuildError> {
        let cell = self.required(column)?;
        cell.as_i64()
            .ok_or_else(|| self.invalid(column, "a whole number of seconds", cell))
    }

    /// The cell as text, integral numbers without a decimal point.
    fn quantity(&self, column: &'static str) -> Result<String, BuildError> {
        Ok(self.required(column)?.to_string())
    }

    /// The cell copied as a scalar; date-time cells are rendered as RFC 3339.
    fn scalar(&self, column: &'static str) -> Result<Scalar, BuildError> {
        let cell = self.required(column)?;
        match cell {
            CellValue::Number(n) => Ok(Scalar::from_f64(*n)),
            CellValue::Text(s) => Ok(Scalar::Text(s.clone())),
            CellValue::DateTime(dt) => Ok(Scalar::Text(dt.format(DATETIME_FORMAT).to_string())),
            CellValue::Bool(_) | CellValue::Blank => Err(self.invalid(column, "a time", cell)),
        }
    }

    fn lat_lng(&self, lat: &'static str, lng: &'static str) -> Result<LatLng, BuildError> {
        Ok(LatLng::new(self.float(lat)?, self.float(lng)?))
    }
}

/// Resolves shipment location references to coordinates.
struct LocationIndex {
    /// Shipment column holding the reference, fixed once from the header.
    column: &'static str,
    points: LocationPoints,
}

enum LocationPoints {
    Positional(Vec<LatLng>),
    ById(HashMap<String, LatLng>),
}

impl LocationIndex {
    fn build(locations: &Sheet, shipments: &Sheet, lookup: LocationLookup) -> Result<Self, BuildError> {
        let column = if shipments.has_column(LOCATION_REFERENCE_COLUMN) {
            LOCATION_REFERENCE_COLUMN
        } else {
            "id"
        };

        let rows = SheetRow::all(locations, LOCATIONS_SHEET);
        let points = match lookup {
            LocationLookup::Positional => rows
                .map(|r| r.lat_lng("latitude", "longitude"))
                .collect::<Result<Vec<_>, _>>()
                .map(LocationPoints::Positional)?,
            LocationLookup::ById => {
                let mut by_id = HashMap::new();
                for r in rows {
                    let id = r.required("id")?.to_string();
                    let point = r.lat_lng("latitude", "longitude")?;
                    if by_id.insert(id.clone(), point).is_some() {
                        return Err(BuildError::DuplicateLocationId { row: r.number(), id });
                    }
                }
                LocationPoints::ById(by_id)
            }
        };
        Ok(Self { column, points })
    }

    fn resolve(&self, shipment: &SheetRow<'_>) -> Result<LatLng, BuildError> {
        let reference = shipment.required(self.column)?;
        let missing = || BuildError::MissingLocation {
            row: shipment.number(),
            reference: reference.to_string(),
        };

        match &self.points {
            LocationPoints::Positional(points) => {
                let index = reference
                    .as_i64()
                    .filter(|i| *i >= 0)
                    .ok_or_else(|| shipment.invalid(self.column, "a row index", reference))?;
                usize::try_from(index)
                    .ok()
                    .and_then(|i| points.get(i))
                    .copied()
                    .ok_or_else(missing)
            }
            LocationPoints::ById(points) => points.get(&reference.to_string()).copied().ok_or_else(missing),
        }
    }
}

/// Builds a scenario from the five planner sheets.
///
/// Fails on the first missing sheet, row or mandatory field.
///
/// # Examples
///
/// ```
/// use fleet_routing_uploads::converters::{build_scenario, LocationLookup};
/// use fleet_routing_uploads::demo_data::generate_cdmx;
///
/// let scenario = build_scenario(&generate_cdmx(), LocationLookup::Positional).unwrap();
/// assert_eq!(scenario.model.shipments.len(), 6);
/// assert_eq!(scenario.model.vehicles.len(), 4);
/// ```
pub fn build_scenario(workbook: &Workbook, lookup: LocationLookup) -> Result<Scenario, BuildError> {
    let model_sheet = workbook.sheet(MODEL_SHEET)?;
    let shipments_sheet = workbook.sheet(SHIPMENTS_SHEET)?;
    let locations_sheet = workbook.sheet(LOCATIONS_SHEET)?;
    let windows_sheet = workbook.sheet(TIME_WINDOWS_SHEET)?;
    let vehicles_sheet = workbook.sheet(VEHICLES_SHEET)?;

    let first = SheetRow::all(model_sheet, MODEL_SHEET)
        .next()
        .ok_or(BuildError::EmptySheet(MODEL_SHEET))?;
    let global_start_time = first.scalar("global_start")?;
    let global_end_time = first.scalar("global_end")?;

    let locations = LocationIndex::build(locations_sheet, shipments_sheet, lookup)?;
    let windows: Vec<SheetRow<'_>> = SheetRow::all(windows_sheet, TIME_WINDOWS_SHEET).collect();

    let shipments = SheetRow::all(shipments_sheet, SHIPMENTS_SHEET)
        .map(|row| build_shipment(&row, &locations, &windows))
        .collect::<Result<Vec<_>, _>>()?;

    let vehicles = SheetRow::all(vehicles_sheet, VEHICLES_SHEET)
        .map(|row| build_vehicle(&row))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Scenario {
        model: ShipmentModel {
            global_start_time: Some(global_start_time),
            global_end_time: Some(global_end_time),
            shipments,
            vehicles,
        },
        ..Default::default()
    })
}

fn build_shipment(
    row: &SheetRow<'_>,
    locations: &LocationIndex,
    windows: &[SheetRow<'_>],
) -> Result<Shipment, BuildError> {
    let id = row.required("id")?;
    let demand = row.quantity("demanda")?;
    let seconds = row.whole_seconds("time_service")?;
    let arrival = locations.resolve(row)?;

    let time_windows = windows
        .iter()
        .filter(|w| w.row.get("id_shipment") == Some(id))
        .map(|w| {
            Ok(TimeWindow {
                start_time: Some(w.scalar("start_time_window")?),
                end_time: Some(w.scalar("end_time_window")?),
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    Ok(Shipment {
        demands: vec![Load::weight_kilograms(demand)],
        deliveries: vec![VisitRequest {
            arrival_location: Some(arrival),
            time_windows,
            duration: Some(ServiceDuration::from_seconds(seconds)),
            ..Default::default()
        }],
        ..Default::default()
    })
}

fn build_vehicle(row: &SheetRow<'_>) -> Result<Vehicle, BuildError> {
    Ok(Vehicle {
        start_location: Some(row.lat_lng("latitude_salida", "longitude_salida")?),
        end_location: Some(row.lat_lng("latitude_llegada", "longitude_llegada")?),
        capacities: vec![Load::weight_kilograms(row.quantity("capacidad_peso")?)],
        cost_per_hour: Some(row.float("costo_hora")?),
        cost_per_kilometer: Some(row.float("costo_km")?),
        ..Default::default()
    })
}

impl fmt::Display for LocationLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LocationLookup::Positional => "positional",
            LocationLookup::ById => "by_id",
        })
    }
}
