//! Daily port event log

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::models::PortEventStatus;

#[derive(Clone)]
pub struct PortEventService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PortEvent {
    pub id: Uuid,
    pub event_date: NaiveDate,
    pub port_name: String,
    pub vessel_name: Option<String>,
    pub event_type: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub status: PortEventStatus,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PortEventFilter {
    pub event_date: Option<NaiveDate>,
    pub port_name: Option<String>,
    pub event_type: Option<String>,
    pub status: Option<PortEventStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePortEventInput {
    pub event_date: NaiveDate,
    #[validate(length(min = 1, max = 100, message = "Port name is required"))]
    pub port_name: String,
    pub vessel_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Event type is required"))]
    pub event_type: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[serde(default)]
    pub status: PortEventStatus,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePortEventInput {
    pub event_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 100, message = "Port name must not be empty"))]
    pub port_name: Option<String>,
    pub vessel_name: Option<String>,
    pub event_type: Option<String>,
    pub description: Option<String>,
    pub status: Option<PortEventStatus>,
}

impl PortEventService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &PortEventFilter) -> AppResult<Vec<PortEvent>> {
        let events = sqlx::query_as::<_, PortEvent>(
            r#"
            SELECT id, event_date, port_name, vessel_name, event_type, description, status,
                   recorded_by, created_at, updated_at
            FROM port_events
            WHERE ($1::date IS NULL OR event_date = $1)
              AND ($2::text IS NULL OR port_name = $2)
              AND ($3::text IS NULL OR event_type = $3)
              AND ($4::text IS NULL OR status = $4)
            ORDER BY event_date DESC, created_at DESC
            "#,
        )
        .bind(filter.event_date)
        .bind(filter.port_name.as_deref())
        .bind(filter.event_type.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        Ok(events)
    }

    pub async fn get(&self, event_id: Uuid) -> AppResult<PortEvent> {
        sqlx::query_as::<_, PortEvent>(
            r#"
            SELECT id, event_date, port_name, vessel_name, event_type, description, status,
                   recorded_by, created_at, updated_at
            FROM port_events
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Port event".to_string()))
    }

    pub async fn create(
        &self,
        recorder: &AuthUser,
        input: CreatePortEventInput,
    ) -> AppResult<PortEvent> {
        let event_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO port_events (event_date, port_name, vessel_name, event_type, description,
                                     status, recorded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(input.event_date)
        .bind(&input.port_name)
        .bind(&input.vessel_name)
        .bind(&input.event_type)
        .bind(&input.description)
        .bind(input.status.as_str())
        .bind(recorder.user_id)
        .fetch_one(&self.db)
        .await?;

        self.get(event_id).await
    }

    pub async fn update(&self, event_id: Uuid, input: UpdatePortEventInput) -> AppResult<PortEvent> {
        let result = sqlx::query(
            r#"
            UPDATE port_events SET
                event_date = COALESCE($2, event_date),
                port_name = COALESCE($3, port_name),
                vessel_name = COALESCE($4, vessel_name),
                event_type = COALESCE($5, event_type),
                description = COALESCE($6, description),
                status = COALESCE($7, status),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .bind(input.event_date)
        .bind(&input.port_name)
        .bind(&input.vessel_name)
        .bind(&input.event_type)
        .bind(&input.description)
        .bind(input.status.map(|s| s.as_str()))
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Port event".to_string()));
        }

        self.get(event_id).await
    }

    pub async fn delete(&self, event_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM port_events WHERE id = $1")
            .bind(event_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Port event".to_string()));
        }
        Ok(())
    }
}
