//! Incident handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::handlers::report::document_response;
use crate::middleware::CurrentUser;
use crate::services::export::{self, RenderOptions};
use crate::services::incident::{
    CreateIncidentInput, IncidentDetail, IncidentFilter, NoteInput, StatusUpdateInput,
    UpdateIncidentInput,
};
use crate::services::IncidentService;
use crate::AppState;
use shared::models::{IncidentStatus, ReportFormat, Severity};
use shared::permissions::{CREATE_INCIDENTS, EXPORT_DATA, MANAGE_INCIDENTS, VIEW_INCIDENTS};

/// Query for `GET /incidents/export`
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_export_format")]
    pub format: ReportFormat,
    pub status: Option<IncidentStatus>,
    pub severity: Option<Severity>,
    pub incident_type: Option<String>,
    pub assigned_to: Option<Uuid>,
}

fn default_export_format() -> ReportFormat {
    ReportFormat::Excel
}

impl ExportQuery {
    fn filter(&self) -> IncidentFilter {
        IncidentFilter {
            status: self.status,
            severity: self.severity,
            incident_type: self.incident_type.clone(),
            assigned_to: self.assigned_to,
        }
    }
}

pub async fn list_incidents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<IncidentFilter>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require(VIEW_INCIDENTS)?;

    let incidents = IncidentService::new(state.db.clone()).list(&filter).await?;
    Ok(Json(serde_json::json!({ "incidents": incidents })))
}

/// Incident with its notes and status history
pub async fn get_incident(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(incident_id): Path<Uuid>,
) -> Result<Json<IncidentDetail>, AppError> {
    user.require(VIEW_INCIDENTS)?;

    let incident = IncidentService::new(state.db.clone()).get(incident_id).await?;
    Ok(Json(incident))
}

pub async fn create_incident(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateIncidentInput>,
) -> Result<(StatusCode, Json<IncidentDetail>), AppError> {
    user.require(CREATE_INCIDENTS)?;
    input.validate()?;

    let incident = IncidentService::new(state.db.clone())
        .create(&user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(incident)))
}

pub async fn update_incident(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(incident_id): Path<Uuid>,
    Json(input): Json<UpdateIncidentInput>,
) -> Result<Json<IncidentDetail>, AppError> {
    user.require(MANAGE_INCIDENTS)?;
    input.validate()?;

    let incident = IncidentService::new(state.db.clone())
        .update(incident_id, input)
        .await?;
    Ok(Json(incident))
}

/// Set the status and append a history entry
pub async fn update_incident_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(incident_id): Path<Uuid>,
    Json(input): Json<StatusUpdateInput>,
) -> Result<Json<IncidentDetail>, AppError> {
    user.require(MANAGE_INCIDENTS)?;

    let incident = IncidentService::new(state.db.clone())
        .update_status(incident_id, &user, input)
        .await?;
    Ok(Json(incident))
}

pub async fn add_incident_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(incident_id): Path<Uuid>,
    Json(input): Json<NoteInput>,
) -> Result<(StatusCode, Json<IncidentDetail>), AppError> {
    user.require(VIEW_INCIDENTS)?;
    input.validate()?;

    let incident = IncidentService::new(state.db.clone())
        .add_note(incident_id, &user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(incident)))
}

pub async fn delete_incident(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(incident_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(MANAGE_INCIDENTS)?;

    IncidentService::new(state.db.clone()).delete(incident_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Download the filtered incident list as a spreadsheet
pub async fn export_incidents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    user.require(EXPORT_DATA)?;

    if query.format == ReportFormat::Pdf {
        return Err(AppError::validation(
            "format",
            "Export format must be excel or csv",
            "صيغة التصدير يجب أن تكون Excel أو CSV",
        ));
    }

    let incidents = IncidentService::new(state.db.clone())
        .list(&query.filter())
        .await?;

    let title = "البلاغات";
    let table = export::incident_table(title, &incidents);
    let format = query.format;
    let bytes = tokio::task::spawn_blocking(move || {
        export::render(format, &table, &RenderOptions::default())
    })
    .await
    .map_err(|e| AppError::ReportGeneration(e.to_string()))??;

    tracing::info!(rows = incidents.len(), format = %format, by = %user.user_id, "Incidents exported");
    Ok(document_response(title, format, bytes))
}
