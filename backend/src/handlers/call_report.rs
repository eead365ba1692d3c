//! Call-center report handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::call_report::{
    CallReport, CallReportFilter, CreateCallReportInput, EscalateInput, UpdateCallReportInput,
};
use crate::services::CallReportService;
use crate::AppState;
use shared::permissions::{CREATE_INCIDENTS, MANAGE_CALL_REPORTS, VIEW_CALL_REPORTS};

pub async fn list_call_reports(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<CallReportFilter>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require(VIEW_CALL_REPORTS)?;

    let calls = CallReportService::new(state.db.clone()).list(&filter).await?;
    Ok(Json(serde_json::json!({ "call_reports": calls })))
}

pub async fn get_call_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(call_id): Path<Uuid>,
) -> Result<Json<CallReport>, AppError> {
    user.require(VIEW_CALL_REPORTS)?;

    let call = CallReportService::new(state.db.clone()).get(call_id).await?;
    Ok(Json(call))
}

pub async fn create_call_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateCallReportInput>,
) -> Result<(StatusCode, Json<CallReport>), AppError> {
    user.require(MANAGE_CALL_REPORTS)?;
    input.validate()?;

    let call = CallReportService::new(state.db.clone())
        .create(&user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(call)))
}

pub async fn update_call_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(call_id): Path<Uuid>,
    Json(input): Json<UpdateCallReportInput>,
) -> Result<Json<CallReport>, AppError> {
    user.require(MANAGE_CALL_REPORTS)?;
    input.validate()?;

    let call = CallReportService::new(state.db.clone())
        .update(call_id, input)
        .await?;
    Ok(Json(call))
}

pub async fn delete_call_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(call_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(MANAGE_CALL_REPORTS)?;

    CallReportService::new(state.db.clone()).delete(call_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// File an incident from a call; the body may be empty
pub async fn escalate_call_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(call_id): Path<Uuid>,
    input: Option<Json<EscalateInput>>,
) -> Result<(StatusCode, Json<CallReport>), AppError> {
    user.require(MANAGE_CALL_REPORTS)?;
    user.require(CREATE_INCIDENTS)?;

    let input = input.map(|Json(body)| body).unwrap_or_default();
    input.validate()?;

    let call = CallReportService::new(state.db.clone())
        .escalate(call_id, &user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(call)))
}
