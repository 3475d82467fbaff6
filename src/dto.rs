//! DTOs for REST API requests/responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::Scenario;
use crate::upload::{PlaceIdProgress, UploadContent, UploadSession, UploadState};

/// Application info response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    /// Application name.
    pub name: &'static str,
    /// Application version.
    pub version: &'static str,
}

/// Error body returned by failing handlers.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub message: String,
    /// Upload reason key, when the failure maps onto one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A scenario document in its JSON wire shape.
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ScenarioDocument(pub Value);

impl ScenarioDocument {
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, serde_json::Error> {
        serde_json::to_value(scenario).map(Self)
    }
}

/// Place-id resolution progress.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceIdProgressDto {
    pub resolving: bool,
    /// Waypoints resolved so far.
    pub progress: usize,
    /// Waypoints carrying a place id.
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<PlaceIdProgress> for PlaceIdProgressDto {
    fn from(p: PlaceIdProgress) -> Self {
        Self {
            resolving: p.resolving,
            progress: p.progress,
            total: p.total,
            error: p.error,
        }
    }
}

/// Status of an upload session.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusDto {
    pub id: String,
    /// `IDLE`, `VALIDATING`, `VALID` or `INVALID`.
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Reason key of an invalid upload (`required`, `fileFormat`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// `scenario` or `scenarioSolutionPair` once valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_count: Option<usize>,
    #[serde(default)]
    pub has_distance_matrix: bool,
    pub place_ids: PlaceIdProgressDto,
}

impl UploadStatusDto {
    pub fn from_session(session: &UploadSession) -> Self {
        let mut dto = Self {
            id: session.id.clone(),
            state: session.state.as_str().to_string(),
            file_name: session.file_name.clone(),
            reason: None,
            message: None,
            upload_type: None,
            shipment_count: None,
            vehicle_count: None,
            has_distance_matrix: false,
            place_ids: session.progress().into(),
        };
        match &session.state {
            UploadState::Valid(content) => {
                let model = &content.scenario().model;
                dto.upload_type = Some(content.upload_type().to_string());
                dto.shipment_count = Some(model.shipments.len());
                dto.vehicle_count = Some(model.vehicles.len());
                dto.has_distance_matrix = !content.scenario().duration_distance_matrices.is_empty();
            }
            UploadState::Invalid { reason, message } => {
                dto.reason = Some(reason.as_str().to_string());
                dto.message = Some(message.clone());
            }
            UploadState::Idle | UploadState::Validating => {}
        }
        dto
    }
}

/// Content handed back when the dialog is submitted.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedUploadDto {
    /// `scenario` or `scenarioSolutionPair`.
    pub upload_type: &'static str,
    /// The scenario, or `{scenario, solution}` for a pair.
    #[schema(value_type = Object)]
    pub content: Value,
}

impl SubmittedUploadDto {
    pub fn from_content(content: &UploadContent) -> Result<Self, serde_json::Error> {
        let value = match content {
            UploadContent::Scenario(scenario) => serde_json::to_value(scenario)?,
            UploadContent::ScenarioSolutionPair(pair) => serde_json::to_value(pair)?,
        };
        Ok(Self {
            upload_type: content.upload_type(),
            content: value,
        })
    }
}
