//! Role management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::role::{CreateRoleInput, Role, UpdateRoleInput};
use crate::services::RoleService;
use crate::AppState;
use shared::permissions::{PermissionInfo, SyncReport, MANAGE_ROLES};

/// Response for list of roles
#[derive(Serialize)]
pub struct RolesResponse {
    pub roles: Vec<Role>,
}

/// Response for list of permissions
#[derive(Serialize)]
pub struct PermissionsResponse {
    pub permissions: &'static [PermissionInfo],
}

/// Get all roles with their user counts
pub async fn list_roles(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<RolesResponse>, AppError> {
    user.require(MANAGE_ROLES)?;

    let role_service = RoleService::new(state.db.clone());
    let roles = role_service.get_roles().await?;

    Ok(Json(RolesResponse { roles }))
}

pub async fn get_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(role_id): Path<Uuid>,
) -> Result<Json<Role>, AppError> {
    user.require(MANAGE_ROLES)?;

    let role_service = RoleService::new(state.db.clone());
    let role = role_service.get_role(role_id).await?;

    Ok(Json(role))
}

/// The permission catalogue roles are built from
pub async fn list_permissions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<PermissionsResponse>, AppError> {
    user.require(MANAGE_ROLES)?;

    let role_service = RoleService::new(state.db.clone());
    let permissions = role_service.get_all_permissions();

    Ok(Json(PermissionsResponse { permissions }))
}

pub async fn create_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateRoleInput>,
) -> Result<(StatusCode, Json<Role>), AppError> {
    user.require(MANAGE_ROLES)?;
    input.validate()?;

    let role_service = RoleService::new(state.db.clone());
    let role = role_service.create_role(input).await?;

    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn update_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(role_id): Path<Uuid>,
    Json(input): Json<UpdateRoleInput>,
) -> Result<Json<Role>, AppError> {
    user.require(MANAGE_ROLES)?;
    input.validate()?;

    let role_service = RoleService::new(state.db.clone());
    let role = role_service.update_role(role_id, input).await?;

    Ok(Json(role))
}

/// Delete a role that no user references
pub async fn delete_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(role_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(MANAGE_ROLES)?;

    let role_service = RoleService::new(state.db.clone());
    role_service.delete_role(role_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Re-copy every role's permissions onto its users
pub async fn sync_permissions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<SyncReport>, AppError> {
    user.require(MANAGE_ROLES)?;

    let role_service = RoleService::new(state.db.clone());
    let report = role_service.sync_user_permissions_with_roles().await?;
    tracing::info!(checked = report.checked, updated = report.updated, "Permission sync requested");

    Ok(Json(report))
}
