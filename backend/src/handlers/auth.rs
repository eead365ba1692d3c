//! Authentication handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::auth::{AuthResponse, RegisterInput};
use crate::services::user::User;
use crate::services::AuthService;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Register a new account with the default role
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    body.validate()?;

    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service.register(body).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service.login(&body.email, &body.password).await?;

    Ok(Json(response))
}

/// Exchange a refresh token for a new token pair
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service.refresh_token(&body.refresh_token).await?;

    Ok(Json(response))
}

/// The signed-in user, with permissions as currently stored
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<User>, AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let me = auth_service.me(user.user_id).await?;

    Ok(Json(me))
}
