//! Application configuration.
//!
//! Built-in defaults overlaid with process environment variables
//! (`PORT`, `DISTANCE_MATRIX_API_KEY`, ...). Credentials have no default.

use config::{Config, ConfigError, Environment, Source};
use serde::Deserialize;
use std::time::Duration;

use crate::converters::LocationLookup;
use crate::heavy_vehicle::{ConversionOptions, FixedRanges, PointSource};
use crate::places::DEFAULT_PLACES_URL;
use crate::routing::DEFAULT_DISTANCE_MATRIX_URL;
use crate::workbook::CellRange;

/// Default request body limit (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,

    /// Front-end `backendApi.apiRoot` and `storageApi.apiRoot`.
    #[serde(default)]
    pub api_root: Option<String>,
    /// Front-end `map.apiKey`; also the places key when none is set.
    #[serde(default)]
    pub map_api_key: Option<String>,
    #[serde(default)]
    pub allow_experimental_features: Option<String>,
    #[serde(default)]
    pub allow_user_gcs_storage: Option<String>,
    #[serde(default)]
    pub frontend_proxy: Option<String>,
    pub frontend_config_path: String,

    pub distance_matrix_url: String,
    #[serde(default)]
    pub distance_matrix_api_key: Option<String>,
    pub distance_matrix_timeout_secs: u64,

    pub places_api_url: String,
    #[serde(default)]
    pub places_api_key: Option<String>,
    pub places_timeout_secs: u64,

    pub location_lookup: LocationLookup,
    pub point_source: PointSource,
    pub location_points_range: CellRange,
    pub vehicle_start_range: CellRange,
    pub vehicle_end_range: CellRange,

    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Loads from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(Environment::default())
    }

    /// Loads from defaults overlaid with `source`.
    pub fn from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let ranges = FixedRanges::default();
        Config::builder()
            .set_default("port", 8080_i64)?
            .set_default("frontend_config_path", "public/config.json")?
            .set_default("distance_matrix_url", DEFAULT_DISTANCE_MATRIX_URL)?
            .set_default("distance_matrix_timeout_secs", 30_i64)?
            .set_default("places_api_url", DEFAULT_PLACES_URL)?
            .set_default("places_timeout_secs", 30_i64)?
            .set_default("location_lookup", LocationLookup::default().to_string())?
            .set_default("point_source", "columns")?
            .set_default("location_points_range", ranges.locations.to_string())?
            .set_default("vehicle_start_range", ranges.vehicle_starts.to_string())?
            .set_default("vehicle_end_range", ranges.vehicle_ends.to_string())?
            .set_default("max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES as i64)?
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    pub fn distance_matrix_timeout(&self) -> Duration {
        Duration::from_secs(self.distance_matrix_timeout_secs)
    }

    pub fn places_timeout(&self) -> Duration {
        Duration::from_secs(self.places_timeout_secs)
    }

    /// `PLACES_API_KEY`, falling back to `MAP_API_KEY`.
    pub fn places_api_key(&self) -> Option<String> {
        non_empty(&self.places_api_key).or_else(|| non_empty(&self.map_api_key))
    }

    pub fn distance_matrix_api_key(&self) -> Option<String> {
        non_empty(&self.distance_matrix_api_key)
    }

    pub fn experimental_features_allowed(&self) -> bool {
        is_true(&self.allow_experimental_features)
    }

    pub fn user_storage_allowed(&self) -> bool {
        is_true(&self.allow_user_gcs_storage)
    }

    pub fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions {
            location_lookup: self.location_lookup,
            point_source: self.point_source,
            ranges: FixedRanges {
                locations: self.location_points_range,
                vehicle_starts: self.vehicle_start_range,
                vehicle_ends: self.vehicle_end_range,
            },
        }
    }
}

/// Keys are shown only as set or unset.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |v: &Option<String>| if non_empty(v).is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("api_root", &self.api_root)
            .field("map_api_key", &set(&self.map_api_key))
            .field("frontend_proxy", &self.frontend_proxy)
            .field("frontend_config_path", &self.frontend_config_path)
            .field("distance_matrix_url", &self.distance_matrix_url)
            .field("distance_matrix_api_key", &set(&self.distance_matrix_api_key))
            .field("places_api_url", &self.places_api_url)
            .field("places_api_key", &set(&self.places_api_key))
            .field("location_lookup", &self.location_lookup)
            .field("point_source", &self.point_source)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

fn is_true(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}
