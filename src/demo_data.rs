//! Demo workbooks for the scenario converter.
//!
//! Provides in-memory spreadsheets laid out exactly like a planner's upload:
//! - CDMX (6 shipments, 4 light vehicles)
//! - CDMX_PESADO (same stops, one heavy vehicle)
//!
//! Sheet layout follows the fixed ranges used for heavy-vehicle point
//! extraction: `Ubicaciones!B2:C7` holds the six stop coordinates and
//! `Unidades!I2:L5` the four vehicles' start and end coordinates.

use crate::workbook::{CellValue, Sheet, Workbook};

/// A named coordinate.
struct LocationData {
    name: &'static str,
    lat: f64,
    lng: f64,
}

/// A vehicle row of the `Unidades` sheet.
struct VehicleData {
    name: &'static str,
    start: usize,
    end: usize,
    capacity_kg: u32,
    cost_per_hour: f64,
    cost_per_km: f64,
}

/// A shipment row of the `Shipments` sheet.
struct ShipmentData {
    demand_kg: u32,
    service_seconds: u32,
    /// (start, end) windows, `HH:MM` on the planning day.
    windows: &'static [(&'static str, &'static str)],
}

/// Demo dataset configuration.
struct DemoConfig {
    date: &'static str,
    day_start: &'static str,
    day_end: &'static str,
    /// Index into the vehicle list of the vehicle typed `pesado`, if any.
    heavy_vehicle: Option<usize>,
}

// ============================================================================
// CDMX Data
// ============================================================================

const CDMX_STOPS: &[LocationData] = &[
    LocationData { name: "Centro Histórico", lat: 19.4326, lng: -99.1332 },
    LocationData { name: "Polanco", lat: 19.4330, lng: -99.1916 },
    LocationData { name: "Coyoacán", lat: 19.3500, lng: -99.1620 },
    LocationData { name: "Santa Fe", lat: 19.3590, lng: -99.2600 },
    LocationData { name: "Roma Norte", lat: 19.4194, lng: -99.1617 },
    LocationData { name: "Azcapotzalco", lat: 19.4840, lng: -99.1860 },
];

const CDMX_DEPOTS: &[LocationData] = &[
    LocationData { name: "CEDIS Vallejo", lat: 19.4890, lng: -99.1480 },
    LocationData { name: "Central de Abasto", lat: 19.3730, lng: -99.0890 },
];

const CDMX_SHIPMENTS: &[ShipmentData] = &[
    ShipmentData { demand_kg: 120, service_seconds: 600, windows: &[("09:00", "12:00")] },
    ShipmentData { demand_kg: 80, service_seconds: 300, windows: &[("10:00", "14:00")] },
    ShipmentData { demand_kg: 200, service_seconds: 900, windows: &[("08:00", "10:00"), ("15:00", "18:00")] },
    ShipmentData { demand_kg: 45, service_seconds: 300, windows: &[("12:00", "16:00")] },
    ShipmentData { demand_kg: 150, service_seconds: 600, windows: &[("09:00", "13:00")] },
    ShipmentData { demand_kg: 310, service_seconds: 1200, windows: &[("07:00", "11:00")] },
];

/// Endpoints index depots first, then stops (see [`vehicle_point`]).
/// Ligero 3 ends at Centro Histórico.
const CDMX_VEHICLES: &[VehicleData] = &[
    VehicleData { name: "Ligero 1", start: 0, end: 0, capacity_kg: 500, cost_per_hour: 180.0, cost_per_km: 6.5 },
    VehicleData { name: "Ligero 2", start: 1, end: 1, capacity_kg: 500, cost_per_hour: 180.0, cost_per_km: 6.5 },
    VehicleData { name: "Ligero 3", start: 0, end: 2, capacity_kg: 750, cost_per_hour: 210.0, cost_per_km: 7.0 },
    VehicleData { name: "Torton 1", start: 1, end: 1, capacity_kg: 3500, cost_per_hour: 420.0, cost_per_km: 14.5 },
];

// ============================================================================
// Sheet Builders
// ============================================================================

fn text(s: &str) -> CellValue {
    CellValue::from(s)
}

fn number(n: impl Into<f64>) -> CellValue {
    CellValue::Number(n.into())
}

/// Builds a sheet whose first row is the header.
fn sheet(name: &str, header: &[&str], rows: Vec<Vec<CellValue>>) -> Sheet {
    let mut grid = vec![header.iter().map(|h| text(h)).collect::<Vec<_>>()];
    grid.extend(rows);
    Sheet::new(name, grid)
}

/// Resolves a vehicle endpoint: depot indices first, then stop indices.
fn vehicle_point(index: usize) -> &'static LocationData {
    match CDMX_DEPOTS.get(index) {
        Some(depot) => depot,
        None => &CDMX_STOPS[(index - CDMX_DEPOTS.len()) % CDMX_STOPS.len()],
    }
}

fn timestamp(date: &str, time: &str) -> CellValue {
    text(&format!("{}T{}:00Z", date, time))
}

fn generate_demo_data(config: &DemoConfig) -> Workbook {
    let modelo = sheet(
        "Modelo",
        &["global_start", "global_end"],
        vec![vec![
            timestamp(config.date, config.day_start),
            timestamp(config.date, config.day_end),
        ]],
    );

    let shipments = sheet(
        "Shipments",
        &["id", "demanda", "time_service"],
        CDMX_SHIPMENTS
            .iter()
            .enumerate()
            .map(|(i, s)| vec![number(i as u32), number(s.demand_kg), number(s.service_seconds)])
            .collect(),
    );

    let ubicaciones = sheet(
        "Ubicaciones",
        &["id", "latitude", "longitude", "nombre"],
        CDMX_STOPS
            .iter()
            .enumerate()
            .map(|(i, l)| vec![number(i as u32), number(l.lat), number(l.lng), text(l.name)])
            .collect(),
    );

    let mut windows = Vec::new();
    for (i, s) in CDMX_SHIPMENTS.iter().enumerate() {
        for (start, end) in s.windows {
            windows.push(vec![
                number(i as u32),
                timestamp(config.date, start),
                timestamp(config.date, end),
            ]);
        }
    }
    let time_windows = sheet(
        "TimeWindows",
        &["id_shipment", "start_time_window", "end_time_window"],
        windows,
    );

    // Columns I:L carry the coordinates read by the fixed ranges.
    let unidades = sheet(
        "Unidades",
        &[
            "id",
            "nombre",
            "tipo",
            "capacidad_peso",
            "costo_hora",
            "costo_km",
            "origen",
            "destino",
            "latitude_salida",
            "longitude_salida",
            "latitude_llegada",
            "longitude_llegada",
        ],
        CDMX_VEHICLES
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let start = vehicle_point(v.start);
                let end = vehicle_point(v.end);
                let kind = if config.heavy_vehicle == Some(i) { "pesado" } else { "ligero" };
                vec![
                    number(i as u32),
                    text(v.name),
                    text(kind),
                    number(v.capacity_kg),
                    number(v.cost_per_hour),
                    number(v.cost_per_km),
                    text(start.name),
                    text(end.name),
                    number(start.lat),
                    number(start.lng),
                    number(end.lat),
                    number(end.lng),
                ]
            })
            .collect(),
    );

    Workbook::new(vec![modelo, shipments, ubicaciones, time_windows, unidades])
}

/// Generates the CDMX workbook with light vehicles only.
///
/// # Examples
///
/// ```
/// use fleet_routing_uploads::demo_data::generate_cdmx;
///
/// let workbook = generate_cdmx();
/// assert_eq!(workbook.sheet("Shipments").unwrap().rows().len(), 6);
/// assert_eq!(workbook.sheet("Unidades").unwrap().rows().len(), 4);
/// ```
pub fn generate_cdmx() -> Workbook {
    generate_demo_data(&DemoConfig {
        date: "2024-05-06",
        day_start: "07:00",
        day_end: "20:00",
        heavy_vehicle: None,
    })
}

/// Generates the CDMX workbook with its last vehicle typed `pesado`.
pub fn generate_cdmx_heavy() -> Workbook {
    generate_demo_data(&DemoConfig {
        date: "2024-05-06",
        day_start: "07:00",
        day_end: "20:00",
        heavy_vehicle: Some(CDMX_VEHICLES.len() - 1),
    })
}

/// Returns all available demo dataset names.
pub fn available_datasets() -> &'static [&'static str] {
    &["CDMX", "CDMX_PESADO"]
}

/// Generates a demo workbook by name.
///
/// # Examples
///
/// ```
/// use fleet_routing_uploads::demo_data::generate_by_name;
///
/// assert!(generate_by_name("cdmx").is_some());
/// assert!(generate_by_name("UNKNOWN").is_none());
/// ```
pub fn generate_by_name(name: &str) -> Option<Workbook> {
    match name.to_uppercase().as_str() {
        "CDMX" => Some(generate_cdmx()),
        "CDMX_PESADO" => Some(generate_cdmx_heavy()),
        _ => None,
    }
}

/// Writes a workbook out as `.xlsx` bytes for upload tests.
#[cfg(test)]
pub(crate) fn to_xlsx(workbook: &Workbook) -> Vec<u8> {
    let mut book = rust_xlsxwriter::Workbook::new();
    for name in workbook.sheet_names() {
        let Ok(sheet) = workbook.sheet(name) else { continue };
        let out = book.add_worksheet();
        out.set_name(name).unwrap();
        let (row0, col0) = sheet.origin();
        for (r, cells) in sheet.grid().iter().enumerate() {
            for (c, cell) in cells.iter().enumerate() {
                let (row, col) = (row0 + r as u32, (col0 as usize + c) as u16);
                match cell {
                    CellValue::Blank => {}
                    CellValue::Bool(b) => {
                        out.write_boolean(row, col, *b).unwrap();
                    }
                    CellValue::Number(n) => {
                        out.write_number(row, col, *n).unwrap();
                    }
                    other => {
                        out.write_string(row, col, other.to_string()).unwrap();
                    }
                }
            }
        }
    }
    book.save_to_buffer().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::CellRange;

    #[test]
    fn test_fixed_ranges_cover_coordinates() {
        let workbook = generate_cdmx();
        let stops = workbook.sheet("Ubicaciones").unwrap();
        let block = stops.block(&"B2:C7".parse::<CellRange>().unwrap());
        assert_eq!(block.len(), CDMX_STOPS.len());
        assert_eq!(block[0], vec![number(19.4326), number(-99.1332)]);

        let vehicles = workbook.sheet("Unidades").unwrap();
        let ends = vehicles.block(&"K2:L5".parse::<CellRange>().unwrap());
        assert_eq!(ends.len(), CDMX_VEHICLES.len());
        // Ligero 3 finishes at a stop.
        assert_eq!(ends[2], vec![number(19.4326), number(-99.1332)]);
    }

    #[test]
    fn test_heavy_flag_only_in_heavy_dataset() {
        let count_heavy = |workbook: &Workbook| {
            workbook
                .sheet("Unidades")
                .unwrap()
                .rows()
                .iter()
                .filter(|r| r.get("tipo").and_then(|c| c.as_text()) == Some("pesado"))
                .count()
        };
        assert_eq!(count_heavy(&generate_cdmx()), 0);
        assert_eq!(count_heavy(&generate_cdmx_heavy()), 1);
    }

    #[test]
    fn test_time_windows_keep_duplicates_per_shipment() {
        let workbook = generate_cdmx();
        let windows = workbook.sheet("TimeWindows").unwrap().rows();
        let for_two = windows
            .iter()
            .filter(|r| r.get("id_shipment") == Some(&number(2)))
            .count();
        assert_eq!(for_two, 2);
    }
}
