//! Report handlers
//!
//! Creating a report records it as `pending` and queues generation. Clients
//! poll `/reports/:id/status`, or pass `?wait=true` to get the finished
//! report in the creation response.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::report::{
    CreateReportInput, Report, ReportFilter, ReportStatusView,
};
use crate::services::report_queue::ReportStore;
use crate::services::{PgReportStore, ReportService};
use crate::AppState;
use shared::models::ReportFormat;
use shared::permissions::{MANAGE_REPORTS, VIEW_REPORTS};

#[derive(Serialize)]
pub struct ReportsResponse {
    pub reports: Vec<Report>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateReportQuery {
    #[serde(default)]
    pub wait: bool,
}

/// `Content-Disposition` naming the download after the report title
pub(crate) fn content_disposition(title: &str, extension: &str) -> String {
    let ascii: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .collect();
    let ascii = ascii.trim();
    let fallback = if ascii.is_empty() { "report" } else { ascii };

    format!(
        "attachment; filename=\"{}.{}\"; filename*=UTF-8''{}.{}",
        fallback,
        extension,
        urlencoding::encode(title),
        extension
    )
}

/// Document body with download headers
pub(crate) fn document_response(title: &str, format: ReportFormat, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(title, format.extension()),
            ),
        ],
        bytes,
    )
        .into_response()
}

pub async fn list_reports(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<ReportsResponse>, AppError> {
    user.require(VIEW_REPORTS)?;

    let reports = ReportService::new(state.db.clone()).list(&filter).await?;
    Ok(Json(ReportsResponse { reports }))
}

pub async fn get_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
) -> Result<Json<Report>, AppError> {
    user.require(VIEW_REPORTS)?;

    let report = ReportService::new(state.db.clone()).get(report_id).await?;
    Ok(Json(report))
}

/// Record a report and queue its generation
pub async fn create_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CreateReportQuery>,
    Json(input): Json<CreateReportInput>,
) -> Result<(StatusCode, Json<Report>), AppError> {
    user.require(MANAGE_REPORTS)?;
    input.validate()?;

    let service = ReportService::new(state.db.clone());
    let report = service.create(&user, input).await?;

    let handle = match state.reports.submit(report.job()).await {
        Ok(handle) => handle,
        Err(err) => {
            PgReportStore::new(state.db.clone())
                .mark_failed(report.id, &err.public_message())
                .await?;
            return Err(err);
        }
    };

    if !query.wait {
        return Ok((StatusCode::CREATED, Json(report)));
    }

    let state_reached = handle.wait().await;
    tracing::debug!(report_id = %report.id, status = %state_reached.status(), "Awaited report job");

    let report = service.get(report.id).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn get_report_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ReportStatusView>, AppError> {
    user.require(VIEW_REPORTS)?;

    let report = ReportService::new(state.db.clone()).get(report_id).await?;
    Ok(Json(ReportStatusView::from(&report)))
}

/// Stream the finished file; 409 until the report is completed
pub async fn download_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
) -> Result<Response, AppError> {
    user.require(VIEW_REPORTS)?;

    let (report, bytes) = ReportService::new(state.db.clone())
        .download(report_id)
        .await?;

    Ok(document_response(&report.title, report.format, bytes))
}

pub async fn delete_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(MANAGE_REPORTS)?;

    ReportService::new(state.db.clone()).delete(report_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
