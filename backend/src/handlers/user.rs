//! User management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::user::{CreateUserInput, UpdateUserInput, User, UserFilter};
use crate::services::UserService;
use crate::AppState;
use shared::permissions::{MANAGE_USERS, VIEW_USERS};

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<UserFilter>,
) -> Result<Json<UsersResponse>, AppError> {
    user.require(VIEW_USERS)?;

    let users = UserService::new(state.db.clone()).list(&filter).await?;
    Ok(Json(UsersResponse { users }))
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    user.require(VIEW_USERS)?;

    let found = UserService::new(state.db.clone()).get(user_id).await?;
    Ok(Json(found))
}

pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), AppError> {
    user.require(MANAGE_USERS)?;
    input.validate()?;

    let created = UserService::new(state.db.clone()).create(input).await?;
    tracing::info!(user_id = %created.id, by = %user.user_id, "User created");

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> Result<Json<User>, AppError> {
    user.require(MANAGE_USERS)?;
    input.validate()?;

    let updated = UserService::new(state.db.clone())
        .update(user_id, input)
        .await?;
    Ok(Json(updated))
}

pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(MANAGE_USERS)?;

    UserService::new(state.db.clone())
        .delete(user_id, user.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
