//! Work permit handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::work_permit::{
    CreateWorkPermitInput, PermitStatusInput, UpdateWorkPermitInput, WorkPermit, WorkPermitFilter,
};
use crate::services::WorkPermitService;
use crate::AppState;
use shared::permissions::{MANAGE_WORK_PERMITS, VIEW_WORK_PERMITS};

pub async fn list_work_permits(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<WorkPermitFilter>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require(VIEW_WORK_PERMITS)?;

    let permits = WorkPermitService::new(state.db.clone()).list(&filter).await?;
    Ok(Json(serde_json::json!({ "work_permits": permits })))
}

pub async fn get_work_permit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(permit_id): Path<Uuid>,
) -> Result<Json<WorkPermit>, AppError> {
    user.require(VIEW_WORK_PERMITS)?;

    let permit = WorkPermitService::new(state.db.clone()).get(permit_id).await?;
    Ok(Json(permit))
}

pub async fn create_work_permit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateWorkPermitInput>,
) -> Result<(StatusCode, Json<WorkPermit>), AppError> {
    user.require(MANAGE_WORK_PERMITS)?;
    input.validate()?;

    let permit = WorkPermitService::new(state.db.clone())
        .create(&user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(permit)))
}

pub async fn update_work_permit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(permit_id): Path<Uuid>,
    Json(input): Json<UpdateWorkPermitInput>,
) -> Result<Json<WorkPermit>, AppError> {
    user.require(MANAGE_WORK_PERMITS)?;
    input.validate()?;

    let permit = WorkPermitService::new(state.db.clone())
        .update(permit_id, input)
        .await?;
    Ok(Json(permit))
}

/// Approve, reject or expire a permit
pub async fn update_work_permit_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(permit_id): Path<Uuid>,
    Json(input): Json<PermitStatusInput>,
) -> Result<Json<WorkPermit>, AppError> {
    user.require(MANAGE_WORK_PERMITS)?;

    let permit = WorkPermitService::new(state.db.clone())
        .update_status(permit_id, &user, input)
        .await?;
    Ok(Json(permit))
}

pub async fn delete_work_permit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(permit_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(MANAGE_WORK_PERMITS)?;

    WorkPermitService::new(state.db.clone()).delete(permit_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
