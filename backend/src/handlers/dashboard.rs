//! Dashboard handlers

use axum::{extract::State, Json};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::dashboard::DashboardStats;
use crate::services::DashboardService;
use crate::AppState;
use shared::permissions::VIEW_DASHBOARD;

pub async fn get_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<DashboardStats>, AppError> {
    user.require(VIEW_DASHBOARD)?;

    let stats = DashboardService::new(state.db.clone()).get_stats().await?;
    Ok(Json(stats))
}
