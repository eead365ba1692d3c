//! Case handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::case::{Case, CaseFilter, CreateCaseInput, UpdateCaseInput};
use crate::services::CaseService;
use crate::AppState;
use shared::permissions::{MANAGE_CASES, VIEW_CASES};

pub async fn list_cases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<CaseFilter>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require(VIEW_CASES)?;

    let cases = CaseService::new(state.db.clone()).list(&filter).await?;
    Ok(Json(serde_json::json!({ "cases": cases })))
}

pub async fn get_case(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(case_id): Path<Uuid>,
) -> Result<Json<Case>, AppError> {
    user.require(VIEW_CASES)?;

    let case = CaseService::new(state.db.clone()).get(case_id).await?;
    Ok(Json(case))
}

pub async fn create_case(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateCaseInput>,
) -> Result<(StatusCode, Json<Case>), AppError> {
    user.require(MANAGE_CASES)?;
    input.validate()?;

    let case = CaseService::new(state.db.clone()).create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(case)))
}

/// Only the case owner or an administrator may change a case
pub async fn update_case(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(case_id): Path<Uuid>,
    Json(input): Json<UpdateCaseInput>,
) -> Result<Json<Case>, AppError> {
    user.require(MANAGE_CASES)?;
    input.validate()?;

    let case = CaseService::new(state.db.clone())
        .update(case_id, &user, input)
        .await?;
    Ok(Json(case))
}

pub async fn delete_case(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(case_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(MANAGE_CASES)?;

    CaseService::new(state.db.clone()).delete(case_id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}
