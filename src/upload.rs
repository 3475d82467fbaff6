//! Upload sessions.
//!
//! One session per upload dialog. A session holds at most one file in flight
//! and walks `Idle -> Validating -> {Valid, Invalid} -> Idle`. Selecting a new
//! file bumps the session generation, so a slower validation of an older
//! file can never overwrite the newer result.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::console;
use crate::domain::{Scenario, ScenarioSolutionPair};
use crate::heavy_vehicle::{convert_workbook, ConversionError, ConversionOptions};
use crate::places::{resolve_place_ids, PlaceLookup};
use crate::routing::DistanceMatrixSource;
use crate::validation::{is_zip, load_archive, validate_scenario, ArchiveError, ValidationError};
use crate::workbook::{read_workbook, WorkbookError};

/// File extensions read as spreadsheets.
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

// ============================================================================
// Classification & Pipeline
// ============================================================================

/// How an uploaded file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Spreadsheet,
    Archive,
    Json,
}

impl UploadKind {
    /// Classifies by extension first, then by zip magic bytes.
    ///
    /// ```
    /// use fleet_routing_uploads::upload::UploadKind;
    ///
    /// assert_eq!(UploadKind::classify("rutas.XLSX", b"PK\x03\x04"), UploadKind::Spreadsheet);
    /// assert_eq!(UploadKind::classify("export", b"PK\x03\x04"), UploadKind::Archive);
    /// assert_eq!(UploadKind::classify("scenario.json", b"{}"), UploadKind::Json);
    /// ```
    pub fn classify(file_name: &str, bytes: &[u8]) -> Self {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some(ext) if SPREADSHEET_EXTENSIONS.contains(&ext) => UploadKind::Spreadsheet,
            Some("zip") => UploadKind::Archive,
            _ if is_zip(bytes) => UploadKind::Archive,
            _ => UploadKind::Json,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Spreadsheet => "spreadsheet",
            UploadKind::Archive => "archive",
            UploadKind::Json => "json",
        }
    }
}

/// Form reason key of an invalid upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InvalidReason {
    Required,
    FileFormat,
    ZipContents,
    RequestFormat,
    DistanceMatrix,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::Required => "required",
            InvalidReason::FileFormat => "fileFormat",
            InvalidReason::ZipContents => "zipContents",
            InvalidReason::RequestFormat => "requestFormat",
            InvalidReason::DistanceMatrix => "distanceMatrix",
        }
    }
}

/// Error type for the upload pipeline.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("a file is required")]
    Required,
    #[error(transparent)]
    Workbook(#[from] WorkbookError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("invalid scenario: {0}")]
    Scenario(#[from] ValidationError),
}

impl UploadError {
    /// Maps the error onto the form reason key.
    pub fn reason(&self) -> InvalidReason {
        match self {
            UploadError::Required => InvalidReason::Required,
            UploadError::Workbook(_) | UploadError::Json(_) => InvalidReason::FileFormat,
            UploadError::Conversion(ConversionError::DistanceMatrix(_)) => InvalidReason::DistanceMatrix,
            UploadError::Conversion(_) => InvalidReason::FileFormat,
            // A `.zip` name on bytes that are not a zip.
            UploadError::Archive(ArchiveError::Zip(_)) => InvalidReason::FileFormat,
            UploadError::Archive(_) => InvalidReason::ZipContents,
            UploadError::Scenario(_) => InvalidReason::RequestFormat,
        }
    }
}

/// Validated content of an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadContent {
    Scenario(Scenario),
    ScenarioSolutionPair(ScenarioSolutionPair),
}

impl UploadContent {
    pub fn scenario(&self) -> &Scenario {
        match self {
            UploadContent::Scenario(scenario) => scenario,
            UploadContent::ScenarioSolutionPair(pair) => &pair.scenario,
        }
    }

    pub fn scenario_mut(&mut self) -> &mut Scenario {
        match self {
            UploadContent::Scenario(scenario) => scenario,
            UploadContent::ScenarioSolutionPair(pair) => &mut pair.scenario,
        }
    }

    pub fn upload_type(&self) -> &'static str {
        match self {
            UploadContent::Scenario(_) => "scenario",
            UploadContent::ScenarioSolutionPair(_) => "scenarioSolutionPair",
        }
    }
}

/// Reads, converts and validates one uploaded file.
///
/// Spreadsheets are converted, serialized and then validated like any JSON
/// upload.
pub async fn process_upload(
    file_name: &str,
    bytes: &[u8],
    distance_matrix: &dyn DistanceMatrixSource,
    options: &ConversionOptions,
) -> Result<UploadContent, UploadError> {
    if file_name.trim().is_empty() {
        return Err(UploadError::Required);
    }

    match UploadKind::classify(file_name, bytes) {
        UploadKind::Spreadsheet => {
            let workbook = read_workbook(bytes)?;
            let built = convert_workbook(&workbook, distance_matrix, options).await?;
            let json = serde_json::to_value(&built)?;
            Ok(UploadContent::Scenario(validate_scenario(&json)?))
        }
        UploadKind::Archive => Ok(UploadContent::ScenarioSolutionPair(load_archive(bytes)?)),
        UploadKind::Json => {
            let json: serde_json::Value = serde_json::from_slice(bytes)?;
            Ok(UploadContent::Scenario(validate_scenario(&json)?))
        }
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Upload state of a session.
#[derive(Debug, Clone, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Validating,
    Valid(UploadContent),
    Invalid {
        reason: InvalidReason,
        message: String,
    },
}

impl UploadState {
    /// Returns the state as a SCREAMING_SNAKE_CASE string.
    ///
    /// ```
    /// use fleet_routing_uploads::upload::UploadState;
    ///
    /// assert_eq!(UploadState::Idle.as_str(), "IDLE");
    /// assert_eq!(UploadState::Validating.as_str(), "VALIDATING");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Idle => "IDLE",
            UploadState::Validating => "VALIDATING",
            UploadState::Valid(_) => "VALID",
            UploadState::Invalid { .. } => "INVALID",
        }
    }
}

/// Place-id resolution progress of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceIdProgress {
    pub resolving: bool,
    pub progress: usize,
    pub total: usize,
    pub error: Option<String>,
}

/// Error type for session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("upload session `{0}` not found")]
    NotFound(String),
    #[error("no valid upload in session")]
    NotValid,
    #[error("place id resolution already running")]
    Resolving,
}

/// Work handed to a place-id resolution task.
struct ResolutionJob {
    scenario: Scenario,
    generation: u64,
    cancel: CancellationToken,
    progress: Arc<watch::Sender<PlaceIdProgress>>,
}

/// State of one upload dialog.
pub struct UploadSession {
    pub id: String,
    pub file_name: Option<String>,
    pub state: UploadState,
    generation: u64,
    /// Cancelled when the dialog closes.
    closed: CancellationToken,
    /// Child of `closed` for the running resolution, if any.
    resolution: Option<CancellationToken>,
    progress: Arc<watch::Sender<PlaceIdProgress>>,
}

impl UploadSession {
    pub fn new(id: String) -> Self {
        let (progress, _) = watch::channel(PlaceIdProgress::default());
        Self {
            id,
            file_name: None,
            state: UploadState::Idle,
            generation: 0,
            closed: CancellationToken::new(),
            resolution: None,
            progress: Arc::new(progress),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts validating a newly selected file and returns its ticket.
    ///
    /// Any resolution for the previous file is cancelled.
    pub fn begin(&mut self, file_name: &str) -> u64 {
        self.generation += 1;
        if let Some(resolution) = self.resolution.take() {
            resolution.cancel();
        }
        self.file_name = Some(file_name.to_string());
        self.state = UploadState::Validating;
        self.progress.send_replace(PlaceIdProgress::default());
        self.generation
    }

    /// Records the result for `ticket`. Returns `false` for a stale ticket.
    pub fn complete(&mut self, ticket: u64, result: Result<UploadContent, UploadError>) -> bool {
        if ticket != self.generation {
            debug!(session_id = %self.id, ticket, current = self.generation, "Discarding stale upload result");
            return false;
        }
        self.state = match result {
            Ok(content) => {
                let total = content.scenario().place_id_count();
                self.progress.send_modify(|p| p.total = total);
                UploadState::Valid(content)
            }
            Err(e) => UploadState::Invalid {
                reason: e.reason(),
                message: e.to_string(),
            },
        };
        true
    }

    pub fn content(&self) -> Option<&UploadContent> {
        match &self.state {
            UploadState::Valid(content) => Some(content),
            _ => None,
        }
    }

    pub fn is_resolving(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn progress(&self) -> PlaceIdProgress {
        self.progress.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaceIdProgress> {
        self.progress.subscribe()
    }

    /// Closes the dialog, stopping any running resolution.
    pub fn close(&mut self) {
        self.closed.cancel();
        self.resolution = None;
    }

    fn begin_resolution(&mut self) -> Result<ResolutionJob, SessionError> {
        if self.is_resolving() {
            return Err(SessionError::Resolving);
        }
        let scenario = self.content().ok_or(SessionError::NotValid)?.scenario().clone();
        let cancel = self.closed.child_token();
        self.resolution = Some(cancel.clone());
        self.progress.send_replace(PlaceIdProgress {
            resolving: true,
            progress: 0,
            total: scenario.place_id_count(),
            error: None,
        });
        Ok(ResolutionJob {
            scenario,
            generation: self.generation,
            cancel,
            progress: Arc::clone(&self.progress),
        })
    }

    /// Publishes resolution progress for `generation`. Returns `false` when
    /// the file changed since that resolution started.
    fn report_progress(&self, generation: u64, progress: usize) -> bool {
        if generation != self.generation {
            return false;
        }
        self.progress.send_modify(|p| p.progress = progress);
        true
    }

    /// Writes resolved waypoints back. Returns `false` when the file changed.
    fn finish_resolution(&mut self, generation: u64, scenario: Scenario) -> bool {
        if generation != self.generation {
            return false;
        }
        self.resolution = None;
        if let UploadState::Valid(content) = &mut self.state {
            *content.scenario_mut() = scenario;
        }
        true
    }

    /// Takes the validated content and returns the session to `Idle`.
    fn take_content(&mut self) -> Result<UploadContent, SessionError> {
        if self.is_resolving() {
            return Err(SessionError::Resolving);
        }
        match std::mem::take(&mut self.state) {
            UploadState::Valid(content) => {
                self.file_name = None;
                self.progress.send_replace(PlaceIdProgress::default());
                Ok(content)
            }
            other => {
                self.state = other;
                Err(SessionError::NotValid)
            }
        }
    }
}

// ============================================================================
// Session Service
// ============================================================================

/// Manages upload sessions and their background work.
pub struct UploadService {
    sessions: RwLock<HashMap<String, Arc<RwLock<UploadSession>>>>,
    distance_matrix: Arc<dyn DistanceMatrixSource>,
    places: Arc<dyn PlaceLookup>,
    options: ConversionOptions,
}

impl UploadService {
    pub fn new(
        distance_matrix: Arc<dyn DistanceMatrixSource>,
        places: Arc<dyn PlaceLookup>,
        options: ConversionOptions,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            distance_matrix,
            places,
            options,
        }
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn distance_matrix(&self) -> &dyn DistanceMatrixSource {
        self.distance_matrix.as_ref()
    }

    /// Opens a new session.
    pub fn create_session(&self) -> Arc<RwLock<UploadSession>> {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(RwLock::new(UploadSession::new(id.clone())));
        self.sessions.write().insert(id.clone(), session.clone());
        info!(session_id = %id, "Upload session opened");
        session
    }

    pub fn get_session(&self, id: &str) -> Option<Arc<RwLock<UploadSession>>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn list_sessions(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    fn session(&self, id: &str) -> Result<Arc<RwLock<UploadSession>>, SessionError> {
        self.get_session(id).ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Selects a file and validates it.
    ///
    /// Returns the session once this file's result is recorded, or once a
    /// newer selection has superseded it.
    pub async fn select_file(
        &self,
        id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Arc<RwLock<UploadSession>>, SessionError> {
        let session = self.session(id)?;
        let ticket = session.write().begin(file_name);
        let kind = UploadKind::classify(file_name, bytes);
        info!(session_id = %id, file_name, kind = kind.as_str(), bytes = bytes.len(), "Validating upload");

        let start = Instant::now();
        let result = process_upload(file_name, bytes, self.distance_matrix.as_ref(), &self.options).await;
        match &result {
            Ok(content) => console::print_upload_valid(
                file_name,
                content.upload_type(),
                content.scenario().model.shipments.len(),
                content.scenario().model.vehicles.len(),
                !content.scenario().duration_distance_matrices.is_empty(),
                start.elapsed(),
            ),
            Err(e) => {
                warn!(session_id = %id, file_name, reason = e.reason().as_str(), error = %e, "Upload invalid");
                console::print_upload_invalid(file_name, e.reason().as_str(), &e.to_string());
            }
        }

        session.write().complete(ticket, result);
        Ok(session)
    }

    /// Starts place-id resolution for the session's valid upload.
    pub fn start_resolution(&self, id: &str) -> Result<PlaceIdProgress, SessionError> {
        let session = self.session(id)?;
        let job = session.write().begin_resolution()?;
        let started = job.progress.borrow().clone();
        let places = Arc::clone(&self.places);
        let session_id = id.to_string();

        tokio::spawn(async move {
            let ResolutionJob {
                mut scenario,
                generation,
                cancel,
                progress,
            } = job;
            let start = Instant::now();
            let total = scenario.place_id_count();

            let outcome = resolve_place_ids(&mut scenario, places.as_ref(), &cancel, |n| {
                session.read().report_progress(generation, n);
            })
            .await;

            info!(
                session_id = %session_id,
                resolved = outcome.resolved(),
                total,
                progress = outcome.progress(),
                "Place id resolution finished"
            );
            console::print_place_ids_resolved(outcome.resolved(), total, start.elapsed(), outcome.error());

            // The written-back scenario must be visible before `resolving` clears.
            if session.write().finish_resolution(generation, scenario) {
                progress.send_modify(|p| {
                    p.resolving = false;
                    p.progress = outcome.progress();
                    p.error = outcome.error().map(str::to_owned);
                });
            }
        });

        Ok(started)
    }

    /// Returns the validated content and resets the session to `Idle`.
    pub fn solve(&self, id: &str) -> Result<UploadContent, SessionError> {
        let session = self.session(id)?;
        let content = session.write().take_content()?;
        info!(session_id = %id, upload_type = content.upload_type(), "Upload submitted");
        Ok(content)
    }

    /// Closes the dialog: cancels resolution and drops the session.
    pub fn close(&self, id: &str) -> Option<Arc<RwLock<UploadSession>>> {
        let session = self.sessions.write().remove(id)?;
        session.write().close();
        info!(session_id = %id, "Upload session closed");
        Some(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::{generate_cdmx, generate_cdmx_heavy, to_xlsx};
    use crate::domain::{LatLng, Shipment, VisitRequest, Waypoint};
    use crate::places::PlaceLookupError;
    use crate::routing::{HttpDistanceMatrix, DEFAULT_DISTANCE_MATRIX_URL};
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Resolves every id to the same point, optionally waiting on a gate.
    struct GatedLookup {
        gate: Option<Arc<Notify>>,
    }

    impl PlaceLookup for GatedLookup {
        fn details<'a>(&'a self, _place_id: &'a str) -> BoxFuture<'a, Result<LatLng, PlaceLookupError>> {
            Box::pin(async move {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                Ok(LatLng::new(19.4, -99.1))
            })
        }
    }

    fn service_with(gate: Option<Arc<Notify>>) -> UploadService {
        // No key configured, so any heavy-vehicle fetch fails without a request.
        let matrix = HttpDistanceMatrix::new(DEFAULT_DISTANCE_MATRIX_URL, None, Duration::from_secs(1)).unwrap();
        UploadService::new(Arc::new(matrix), Arc::new(GatedLookup { gate }), ConversionOptions::default())
    }

    fn scenario_bytes(place_ids: &[&str]) -> Vec<u8> {
        let mut scenario = Scenario::default();
        for id in place_ids {
            let mut shipment = Shipment::default();
            shipment.deliveries.push(VisitRequest {
                arrival_waypoint: Some(Waypoint::from_place_id(*id)),
                ..Default::default()
            });
            scenario.model.shipments.push(shipment);
        }
        serde_json::to_vec(&scenario).unwrap()
    }

    async fn wait_until_idle(rx: &mut watch::Receiver<PlaceIdProgress>) -> PlaceIdProgress {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|p| !p.resolving))
            .await
            .unwrap()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_classify() {
        assert_eq!(UploadKind::classify("plan.ods", b""), UploadKind::Spreadsheet);
        assert_eq!(UploadKind::classify("pair.zip", b"not a zip"), UploadKind::Archive);
        assert_eq!(UploadKind::classify("upload", b"{}"), UploadKind::Json);
    }

    #[test]
    fn test_reason_keys() {
        assert_eq!(UploadError::Required.reason().as_str(), "required");
        assert_eq!(
            UploadError::Archive(ArchiveError::IncorrectCount(3)).reason(),
            InvalidReason::ZipContents
        );
        assert_eq!(
            UploadError::Scenario(ValidationError::new("model", "must be an object")).reason(),
            InvalidReason::RequestFormat
        );
        assert_eq!(
            serde_json::to_value(InvalidReason::DistanceMatrix).unwrap(),
            json!("distanceMatrix")
        );
    }

    #[tokio::test]
    async fn test_spreadsheet_upload_is_validated_scenario() {
        let service = service_with(None);
        let bytes = to_xlsx(&generate_cdmx());
        let content = process_upload("cdmx.xlsx", &bytes, service.distance_matrix(), service.options())
            .await
            .unwrap();
        let scenario = content.scenario();
        assert_eq!(scenario.model.shipments.len(), 6);
        assert_eq!(scenario.model.vehicles.len(), 4);
        assert!(scenario.duration_distance_matrices.is_empty());
        assert_eq!(content.upload_type(), "scenario");
    }

    #[tokio::test]
    async fn test_heavy_fetch_failure_has_own_reason() {
        let service = service_with(None);
        let bytes = to_xlsx(&generate_cdmx_heavy());
        let err = process_upload("cdmx.xlsx", &bytes, service.distance_matrix(), service.options())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), InvalidReason::DistanceMatrix);
    }

    #[tokio::test]
    async fn test_pipeline_reasons() {
        let service = service_with(None);
        let run = |name: &'static str, bytes: Vec<u8>| {
            let service = &service;
            async move {
                process_upload(name, &bytes, service.distance_matrix(), service.options())
                    .await
                    .unwrap_err()
                    .reason()
            }
        };
        assert_eq!(run("", b"{}".to_vec()).await, InvalidReason::Required);
        assert_eq!(run("scenario.json", b"{model".to_vec()).await, InvalidReason::FileFormat);
        assert_eq!(run("broken.xlsx", b"plain text".to_vec()).await, InvalidReason::FileFormat);
        assert_eq!(
            run("scenario.json", br#"{"model": {"shipments": {}}}"#.to_vec()).await,
            InvalidReason::RequestFormat
        );
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let mut session = UploadSession::new("s".into());
        let first = session.begin("old.json");
        let second = session.begin("new.json");

        assert!(session.complete(second, Err(UploadError::Required)));
        assert!(!session.complete(first, Ok(UploadContent::Scenario(Scenario::default()))));
        assert!(matches!(
            session.state,
            UploadState::Invalid { reason: InvalidReason::Required, .. }
        ));
        assert_eq!(session.file_name.as_deref(), Some("new.json"));
    }

    #[test]
    fn test_progress_of_previous_file_is_dropped() {
        let mut session = UploadSession::new("s".into());
        let ticket = session.begin("old.json");
        let content: Scenario = serde_json::from_slice(&scenario_bytes(&["p1", "p2"])).unwrap();
        assert!(session.complete(ticket, Ok(UploadContent::Scenario(content))));

        let job = session.begin_resolution().unwrap();
        assert!(session.report_progress(job.generation, 1));
        assert_eq!(session.progress().progress, 1);

        session.begin("new.json");
        assert!(!session.report_progress(job.generation, 2));
        assert_eq!(session.progress(), PlaceIdProgress::default());
        assert!(!session.finish_resolution(job.generation, job.scenario));
    }

    #[tokio::test]
    async fn test_select_file_then_solve() {
        let service = service_with(None);
        let id = service.create_session().read().id.clone();

        let session = service.select_file(&id, "scenario.json", &scenario_bytes(&["p1"])).await.unwrap();
        assert_eq!(session.read().state.as_str(), "VALID");
        assert_eq!(session.read().progress().total, 1);

        let content = service.solve(&id).unwrap();
        assert_eq!(content.scenario().model.shipments.len(), 1);
        assert_eq!(session.read().state.as_str(), "IDLE");
        assert_eq!(service.solve(&id), Err(SessionError::NotValid));
    }

    #[tokio::test]
    async fn test_resolution_writes_back() {
        let service = service_with(None);
        let id = service.create_session().read().id.clone();
        let session = service.select_file(&id, "s.json", &scenario_bytes(&["p1", "p2"])).await.unwrap();
        let mut rx = session.read().subscribe();

        let started = service.start_resolution(&id).unwrap();
        assert!(started.resolving);
        assert_eq!(started.total, 2);

        let done = wait_until_idle(&mut rx).await;
        assert_eq!(done.progress, 2);
        assert_eq!(done.error, None);

        let content = service.solve(&id).unwrap();
        let resolved = content.scenario().waypoints().iter().filter(|w| w.lat_lng().is_some()).count();
        assert_eq!(resolved, 2);
    }

    #[tokio::test]
    async fn test_resolution_requires_valid_upload() {
        let service = service_with(None);
        let id = service.create_session().read().id.clone();
        assert_eq!(service.start_resolution(&id), Err(SessionError::NotValid));
        assert_eq!(
            service.start_resolution("missing"),
            Err(SessionError::NotFound("missing".into()))
        );
    }

    #[tokio::test]
    async fn test_close_cancels_resolution() {
        let gate = Arc::new(Notify::new());
        let service = service_with(Some(gate.clone()));
        let id = service.create_session().read().id.clone();
        let session = service.select_file(&id, "s.json", &scenario_bytes(&["p1", "p2"])).await.unwrap();

        service.start_resolution(&id).unwrap();
        assert_eq!(service.solve(&id), Err(SessionError::Resolving));

        let closed = service.close(&id).unwrap();
        assert!(service.get_session(&id).is_none());
        assert!(!closed.read().is_resolving());

        // The lookup never completes, so nothing was merged.
        let guard = session.read();
        let merged = guard
            .content()
            .map(|c| c.scenario().waypoints().iter().filter(|w| w.lat_lng().is_some()).count());
        assert_eq!(merged, Some(0));
    }
}
