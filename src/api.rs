//! REST API for scenario uploads.
//!
//! Provides endpoints for:
//! - Health, info and the front-end `/config.json`
//! - Demo workbook conversion
//! - Spreadsheet-to-scenario conversion
//! - Upload sessions (file selection, place-id resolution, submit)
//! - Swagger UI at /q/swagger-ui

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::demo_data::{available_datasets, generate_by_name};
use crate::dto::{
    ErrorResponse, InfoResponse, PlaceIdProgressDto, ScenarioDocument, SubmittedUploadDto, UploadStatusDto,
};
use crate::frontend::{frontend_config, FrontendConfigError};
use crate::heavy_vehicle::{convert_workbook, ConversionError};
use crate::upload::{InvalidReason, SessionError, UploadService};
use crate::workbook::{read_workbook, WorkbookError};

/// Application state shared across handlers.
pub struct AppState {
    pub config: AppConfig,
    pub uploads: UploadService,
    /// Client for fetching the proxied front-end config.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig, uploads: UploadService) -> Self {
        Self {
            config,
            uploads,
            http: reqwest::Client::new(),
        }
    }
}

/// Creates the API router with CORS, request tracing and Swagger UI enabled.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        // Health, info & front-end config
        .route("/healthz", get(healthz))
        .route("/info", get(info))
        .route("/config.json", get(get_config))
        // Demo data
        .route("/demo-data", get(list_demo_data))
        .route("/demo-data/{name}", get(get_demo_data))
        // Conversion
        .route("/api/scenarios/convert", post(convert_spreadsheet))
        // Upload sessions
        .route("/api/uploads", post(create_upload).get(list_uploads))
        .route("/api/uploads/{id}", get(get_upload).delete(close_upload))
        .route("/api/uploads/{id}/file", put(select_file))
        .route("/api/uploads/{id}/place-ids", post(resolve_place_ids))
        .route("/api/uploads/{id}/place-ids/events", get(place_id_events))
        .route("/api/uploads/{id}/solve", post(solve_upload))
        // Swagger UI at /q/swagger-ui (Quarkus-style path)
        .merge(SwaggerUi::new("/q/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

/// A handler failure: status code plus JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                message: message.into(),
                reason: None,
            },
        }
    }

    fn with_reason(mut self, reason: InvalidReason) -> Self {
        self.body.reason = Some(reason.as_str().to_string());
        self
    }

    fn internal(e: impl std::fmt::Display) -> Self {
        error!(error = %e, "Failed to encode response");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        let status = match e {
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::NotValid | SessionError::Resolving => StatusCode::CONFLICT,
        };
        Self::new(status, e.to_string())
    }
}

impl From<ConversionError> for ApiError {
    fn from(e: ConversionError) -> Self {
        match e {
            ConversionError::DistanceMatrix(_) => {
                Self::new(StatusCode::BAD_GATEWAY, e.to_string()).with_reason(InvalidReason::DistanceMatrix)
            }
            _ => Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).with_reason(InvalidReason::FileFormat),
        }
    }
}

impl From<WorkbookError> for ApiError {
    fn from(e: WorkbookError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).with_reason(InvalidReason::FileFormat)
    }
}

impl From<FrontendConfigError> for ApiError {
    fn from(e: FrontendConfigError) -> Self {
        let status = match e {
            FrontendConfigError::Unavailable(_) => StatusCode::NOT_FOUND,
            FrontendConfigError::NotAnObject { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

// ============================================================================
// Health, Info & Config
// ============================================================================

/// GET /healthz - Health check endpoint.
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Service is healthy", body = String))
)]
async fn healthz() -> &'static str {
    "OK"
}

/// GET /info - Application info endpoint.
#[utoipa::path(
    get,
    path = "/info",
    responses((status = 200, description = "Application info", body = InfoResponse))
)]
async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Fleet Routing Uploads",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /config.json - Front-end config built from the environment.
#[utoipa::path(
    get,
    path = "/config.json",
    responses(
        (status = 200, description = "Front-end config document"),
        (status = 404, description = "Base config unavailable", body = ErrorResponse),
        (status = 500, description = "Base config is not an object", body = ErrorResponse)
    )
)]
async fn get_config(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    Ok(Json(frontend_config(&state.config, &state.http).await?))
}

// ============================================================================
// Demo Data & Conversion
// ============================================================================

/// GET /demo-data - List available demo workbooks.
#[utoipa::path(
    get,
    path = "/demo-data",
    responses((status = 200, description = "List of demo workbook names", body = Vec<String>))
)]
async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(available_datasets().to_vec())
}

/// GET /demo-data/{name} - Convert a demo workbook.
#[utoipa::path(
    get,
    path = "/demo-data/{name}",
    params(("name" = String, Path, description = "Demo workbook name")),
    responses(
        (status = 200, description = "Converted scenario", body = ScenarioDocument),
        (status = 404, description = "Workbook not found", body = ErrorResponse),
        (status = 502, description = "Distance matrix request failed", body = ErrorResponse)
    )
)]
async fn get_demo_data(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ScenarioDocument>, ApiError> {
    let workbook = generate_by_name(&name)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("demo workbook `{}` not found", name)))?;
    let uploads = &state.uploads;
    let scenario = convert_workbook(&workbook, uploads.distance_matrix(), uploads.options()).await?;
    Ok(Json(ScenarioDocument::from_scenario(&scenario).map_err(ApiError::internal)?))
}

/// POST /api/scenarios/convert - Convert spreadsheet bytes into a scenario.
#[utoipa::path(
    post,
    path = "/api/scenarios/convert",
    request_body(content = Vec<u8>, description = "Workbook file", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Converted scenario", body = ScenarioDocument),
        (status = 422, description = "Unreadable or incomplete workbook", body = ErrorResponse),
        (status = 502, description = "Distance matrix request failed", body = ErrorResponse)
    )
)]
async fn convert_spreadsheet(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ScenarioDocument>, ApiError> {
    let workbook = read_workbook(&body)?;
    let uploads = &state.uploads;
    let scenario = convert_workbook(&workbook, uploads.distance_matrix(), uploads.options()).await?;
    Ok(Json(ScenarioDocument::from_scenario(&scenario).map_err(ApiError::internal)?))
}

// ============================================================================
// Upload Session Handlers
// ============================================================================

/// POST /api/uploads - Open an upload session.
#[utoipa::path(
    post,
    path = "/api/uploads",
    responses((status = 201, description = "Session opened", body = UploadStatusDto))
)]
async fn create_upload(State(state): State<Arc<AppState>>) -> (StatusCode, Json<UploadStatusDto>) {
    let session = state.uploads.create_session();
    let dto = UploadStatusDto::from_session(&session.read());
    (StatusCode::CREATED, Json(dto))
}

/// GET /api/uploads - List open session IDs.
#[utoipa::path(
    get,
    path = "/api/uploads",
    responses((status = 200, description = "List of session IDs", body = Vec<String>))
)]
async fn list_uploads(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.uploads.list_sessions())
}

/// GET /api/uploads/{id} - Get session status.
#[utoipa::path(
    get,
    path = "/api/uploads/{id}",
    params(("id" = String, Path, description = "Upload session ID")),
    responses(
        (status = 200, description = "Session status", body = UploadStatusDto),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
async fn get_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UploadStatusDto>, ApiError> {
    let session = state
        .uploads
        .get_session(&id)
        .ok_or(SessionError::NotFound(id))?;
    let dto = UploadStatusDto::from_session(&session.read());
    Ok(Json(dto))
}

#[derive(Debug, Deserialize)]
struct FileQuery {
    #[serde(default)]
    name: String,
}

/// PUT /api/uploads/{id}/file?name= - Select a file for the session.
///
/// The body is the raw file. The response carries the validation outcome.
#[utoipa::path(
    put,
    path = "/api/uploads/{id}/file",
    params(
        ("id" = String, Path, description = "Upload session ID"),
        ("name" = String, Query, description = "Selected file name")
    ),
    request_body(content = Vec<u8>, description = "File contents", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Validation outcome", body = UploadStatusDto),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
async fn select_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
    body: Bytes,
) -> Result<Json<UploadStatusDto>, ApiError> {
    let session = state.uploads.select_file(&id, &query.name, &body).await?;
    let dto = UploadStatusDto::from_session(&session.read());
    Ok(Json(dto))
}

/// POST /api/uploads/{id}/place-ids - Start resolving place IDs.
#[utoipa::path(
    post,
    path = "/api/uploads/{id}/place-ids",
    params(("id" = String, Path, description = "Upload session ID")),
    responses(
        (status = 202, description = "Resolution started", body = PlaceIdProgressDto),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 409, description = "No valid upload, or already resolving", body = ErrorResponse)
    )
)]
async fn resolve_place_ids(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<PlaceIdProgressDto>), ApiError> {
    let progress = state.uploads.start_resolution(&id)?;
    Ok((StatusCode::ACCEPTED, Json(progress.into())))
}

/// GET /api/uploads/{id}/place-ids/events - Stream resolution progress.
///
/// Returns Server-Sent Events. Each event is a progress snapshot; the stream
/// ends after the first snapshot with `resolving: false`.
/// Compatible with frontend's EventSource API.
async fn place_id_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let session = state
        .uploads
        .get_session(&id)
        .ok_or(SessionError::NotFound(id))?;
    let mut rx = session.read().subscribe();

    let stream = async_stream::stream! {
        loop {
            let snapshot: PlaceIdProgressDto = rx.borrow_and_update().clone().into();
            let event = if snapshot.resolving { "progress" } else { "complete" };
            let mut payload = serde_json::to_value(&snapshot).unwrap_or(Value::Null);
            if let Value::Object(map) = &mut payload {
                map.insert("event".to_string(), Value::String(event.to_string()));
            }
            yield Ok::<_, std::convert::Infallible>(format!("data: {}\n\n", payload));

            if !snapshot.resolving || rx.changed().await.is_err() {
                break;
            }
        }
    };

    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    Ok(response)
}

/// POST /api/uploads/{id}/solve - Submit the validated upload.
#[utoipa::path(
    post,
    path = "/api/uploads/{id}/solve",
    params(("id" = String, Path, description = "Upload session ID")),
    responses(
        (status = 200, description = "Validated content", body = SubmittedUploadDto),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 409, description = "No valid upload, or still resolving", body = ErrorResponse)
    )
)]
async fn solve_upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SubmittedUploadDto>, ApiError> {
    let content = state.uploads.solve(&id)?;
    Ok(Json(SubmittedUploadDto::from_content(&content).map_err(ApiError::internal)?))
}

/// DELETE /api/uploads/{id} - Close the dialog.
///
/// Cancels a running resolution and drops the session.
#[utoipa::path(
    delete,
    path = "/api/uploads/{id}",
    params(("id" = String, Path, description = "Upload session ID")),
    responses(
        (status = 204, description = "Session closed"),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
async fn close_upload(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state
        .uploads
        .close(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| SessionError::NotFound(id).into())
}

// ============================================================================
// OpenAPI Documentation
// ============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        healthz,
        info,
        get_config,
        list_demo_data,
        get_demo_data,
        convert_spreadsheet,
        create_upload,
        list_uploads,
        get_upload,
        select_file,
        resolve_place_ids,
        solve_upload,
        close_upload,
    ),
    components(schemas(
        InfoResponse,
        ErrorResponse,
        ScenarioDocument,
        PlaceIdProgressDto,
        UploadStatusDto,
        SubmittedUploadDto,
    ))
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::{generate_cdmx, generate_cdmx_heavy, to_xlsx};
    use crate::domain::LatLng;
    use crate::places::{PlaceLookup, PlaceLookupError};
    use crate::routing::HttpDistanceMatrix;
    use axum::body::to_bytes;
    use axum::http::Request;
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedLookup;

    impl PlaceLookup for FixedLookup {
        fn details<'a>(&'a self, _place_id: &'a str) -> BoxFuture<'a, Result<LatLng, PlaceLookupError>> {
            Box::pin(async { Ok(LatLng::new(19.43, -99.13)) })
        }
    }

    fn app_with(vars: &[(&str, &str)]) -> Router {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = AppConfig::from_source(config::Environment::default().source(Some(map))).unwrap();
        // No key: heavy-vehicle conversions fail without leaving the process.
        let matrix = HttpDistanceMatrix::new(&config.distance_matrix_url, None, Duration::from_secs(1)).unwrap();
        let uploads = UploadService::new(Arc::new(matrix), Arc::new(FixedLookup), config.conversion_options());
        create_router(Arc::new(AppState::new(config, uploads)))
    }

    fn app() -> Router {
        app_with(&[])
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Vec<u8>) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().method(method).uri(uri).body(Body::from(body)).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, method: Method, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, method, uri, body).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn open_session(app: &Router) -> String {
        let (status, body) = send_json(app, Method::POST, "/api/uploads", vec![]).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    fn place_id_scenario() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "model": {
                "shipments": [
                    {"deliveries": [{"arrivalWaypoint": {"placeId": "ChIJa"}}]},
                    {"deliveries": [{"arrivalWaypoint": {"placeId": "ChIJb"}}]}
                ],
                "vehicles": [{}]
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let (status, body) = send(&app(), Method::GET, "/healthz", vec![]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn test_demo_data() {
        let app = app();
        let (status, names) = send_json(&app, Method::GET, "/demo-data", vec![]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names, json!(["CDMX", "CDMX_PESADO"]));

        let (status, scenario) = send_json(&app, Method::GET, "/demo-data/cdmx", vec![]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(scenario["model"]["shipments"].as_array().unwrap().len(), 6);

        let (status, _) = send_json(&app, Method::GET, "/demo-data/unknown", vec![]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_convert_spreadsheet() {
        let app = app();
        let (status, scenario) =
            send_json(&app, Method::POST, "/api/scenarios/convert", to_xlsx(&generate_cdmx())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(scenario["model"]["vehicles"].as_array().unwrap().len(), 4);
        assert!(scenario.get("duration_distance_matrices").is_none());

        let (status, body) = send_json(&app, Method::POST, "/api/scenarios/convert", b"not a workbook".to_vec()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["reason"], "fileFormat");

        let (status, body) =
            send_json(&app, Method::POST, "/api/scenarios/convert", to_xlsx(&generate_cdmx_heavy())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["reason"], "distanceMatrix");
    }

    #[tokio::test]
    async fn test_upload_flow() {
        let app = app();
        let id = open_session(&app).await;

        let uri = format!("/api/uploads/{}/file?name=scenario.json", id);
        let (status, body) = send_json(&app, Method::PUT, &uri, place_id_scenario()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "VALID");
        assert_eq!(body["uploadType"], "scenario");
        assert_eq!(body["placeIds"]["total"], 2);

        let (status, body) = send_json(&app, Method::POST, &format!("/api/uploads/{}/solve", id), vec![]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["uploadType"], "scenario");
        assert_eq!(body["content"]["model"]["shipments"].as_array().unwrap().len(), 2);

        let (status, _) = send_json(&app, Method::POST, &format!("/api/uploads/{}/solve", id), vec![]).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_invalid_upload_reports_reason() {
        let app = app();
        let id = open_session(&app).await;

        let uri = format!("/api/uploads/{}/file?name=scenario.json", id);
        let (_, body) = send_json(&app, Method::PUT, &uri, b"{\"model\": []}".to_vec()).await;
        assert_eq!(body["state"], "INVALID");
        assert_eq!(body["reason"], "requestFormat");

        let uri = format!("/api/uploads/{}/file", id);
        let (_, body) = send_json(&app, Method::PUT, &uri, b"{}".to_vec()).await;
        assert_eq!(body["reason"], "required");
    }

    #[tokio::test]
    async fn test_place_id_events_stream() {
        let app = app();
        let id = open_session(&app).await;
        let uri = format!("/api/uploads/{}/file?name=scenario.json", id);
        send_json(&app, Method::PUT, &uri, place_id_scenario()).await;

        let (status, started) =
            send_json(&app, Method::POST, &format!("/api/uploads/{}/place-ids", id), vec![]).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(started["total"], 2);

        let (status, body) = send(&app, Method::GET, &format!("/api/uploads/{}/place-ids/events", id), vec![]).await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        let last = text.trim_end().lines().last().unwrap();
        let event: Value = serde_json::from_str(last.trim_start_matches("data: ")).unwrap();
        assert_eq!(event["event"], "complete");
        assert_eq!(event["progress"], 2);

        let (_, body) = send_json(&app, Method::POST, &format!("/api/uploads/{}/solve", id), vec![]).await;
        let location = &body["content"]["model"]["shipments"][0]["deliveries"][0]["arrivalWaypoint"];
        assert_eq!(location["placeId"], "ChIJa");
        assert_eq!(location["location"]["latLng"]["latitude"], 19.43);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let app = app();
        let (status, _) = send_json(&app, Method::GET, "/api/uploads/nope", vec![]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send_json(&app, Method::DELETE, "/api/uploads/nope", vec![]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resolution_needs_valid_upload() {
        let app = app();
        let id = open_session(&app).await;
        let (status, _) = send_json(&app, Method::POST, &format!("/api/uploads/{}/place-ids", id), vec![]).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, Method::DELETE, &format!("/api/uploads/{}", id), vec![]).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send_json(&app, Method::GET, &format!("/api/uploads/{}", id), vec![]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_config_json() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), br#"{"map": {"defaultZoom": 11}}"#).unwrap();
        let path = file.path().to_string_lossy().to_string();
        let app = app_with(&[("FRONTEND_CONFIG_PATH", path.as_str()), ("API_ROOT", "/api")]);

        let (status, body) = send_json(&app, Method::GET, "/config.json", vec![]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["backendApi"]["apiRoot"], "/api");
        assert_eq!(body["map"]["defaultZoom"], 11);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json").to_string_lossy().to_string();
        let app = app_with(&[("FRONTEND_CONFIG_PATH", missing.as_str())]);
        let (status, _) = send_json(&app, Method::GET, "/config.json", vec![]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let app = app_with(&[("MAX_UPLOAD_BYTES", "16")]);
        let (status, _) = send(&app, Method::POST, "/api/scenarios/convert", vec![0; 64]).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let (status, doc) = send_json(&app(), Method::GET, "/api-docs/openapi.json", vec![]).await;
        assert_eq!(status, StatusCode::OK);
        let schemas = &doc["components"]["schemas"];
        assert!(schemas.get("ScenarioDocument").is_some());
        assert!(schemas.get("UploadStatusDto").is_some());
        assert!(doc["paths"].get("/api/uploads/{id}/file").is_some());
    }
}
