//! Daily port event handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::port_event::{
    CreatePortEventInput, PortEvent, PortEventFilter, UpdatePortEventInput,
};
use crate::services::PortEventService;
use crate::AppState;
use shared::permissions::{MANAGE_PORT_EVENTS, VIEW_PORT_EVENTS};

pub async fn list_port_events(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<PortEventFilter>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require(VIEW_PORT_EVENTS)?;

    let events = PortEventService::new(state.db.clone()).list(&filter).await?;
    Ok(Json(serde_json::json!({ "port_events": events })))
}

pub async fn get_port_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<Uuid>,
) -> Result<Json<PortEvent>, AppError> {
    user.require(VIEW_PORT_EVENTS)?;

    let event = PortEventService::new(state.db.clone()).get(event_id).await?;
    Ok(Json(event))
}

pub async fn create_port_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreatePortEventInput>,
) -> Result<(StatusCode, Json<PortEvent>), AppError> {
    user.require(MANAGE_PORT_EVENTS)?;
    input.validate()?;

    let event = PortEventService::new(state.db.clone())
        .create(&user, input)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_port_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<Uuid>,
    Json(input): Json<UpdatePortEventInput>,
) -> Result<Json<PortEvent>, AppError> {
    user.require(MANAGE_PORT_EVENTS)?;
    input.validate()?;

    let event = PortEventService::new(state.db.clone())
        .update(event_id, input)
        .await?;
    Ok(Json(event))
}

pub async fn delete_port_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(MANAGE_PORT_EVENTS)?;

    PortEventService::new(state.db.clone()).delete(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
