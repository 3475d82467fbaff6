//! Fleet Routing Uploads
//!
//! Turns vehicle-routing uploads into typed scenario documents: planner
//! spreadsheets are converted (with a distance matrix when the fleet has a
//! heavy vehicle), JSON scenarios and `scenario.json` + `solution.json`
//! archives are validated, and place-id waypoints are resolved to
//! coordinates.
//!
//! # Pipeline
//!
//! - [`workbook`]: spreadsheet bytes to named sheets of header-keyed rows
//! - [`converters`]: sheets to a [`Scenario`](domain::Scenario)
//! - [`heavy_vehicle`]: heavy-vehicle detection and matrix augmentation
//! - [`validation`]: JSON and archive uploads to typed documents
//! - [`places`]: cancellable place-id resolution
//! - [`upload`]: per-dialog upload sessions tying the above together

pub mod api;
pub mod config;
pub mod console;
pub mod converters;
pub mod demo_data;
pub mod domain;
pub mod dto;
pub mod frontend;
pub mod heavy_vehicle;
pub mod places;
pub mod routing;
pub mod upload;
pub mod validation;
pub mod workbook;
