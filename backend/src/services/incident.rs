//! Incident service
//!
//! Incidents carry evidence, free-text notes and an append-only status
//! history. Every status update writes exactly one history entry, even when
//! the status does not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::models::{Evidence, IncidentStatus, Severity};

#[derive(Clone)]
pub struct IncidentService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Incident {
    pub id: Uuid,
    pub incident_number: i64,
    pub title: String,
    pub incident_type: String,
    pub description: String,
    pub location: String,
    pub camera_id: Option<String>,
    #[sqlx(try_from = "String")]
    pub severity: Severity,
    #[sqlx(try_from = "String")]
    pub status: IncidentStatus,
    pub reported_by: Uuid,
    pub reported_by_name: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub evidence: Json<Vec<Evidence>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IncidentNote {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusChange {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub from_status: IncidentStatus,
    #[sqlx(try_from = "String")]
    pub to_status: IncidentStatus,
    pub changed_by: Uuid,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An incident with its notes and status history
#[derive(Debug, Serialize)]
pub struct IncidentDetail {
    #[serde(flatten)]
    pub incident: Incident,
    pub notes: Vec<IncidentNote>,
    pub history: Vec<StatusChange>,
}

const INCIDENT_COLUMNS: &str = r#"
    i.id, i.incident_number, i.title, i.incident_type, i.description, i.location,
    i.camera_id, i.severity, i.status, i.reported_by, u.name AS reported_by_name,
    i.assigned_to, i.evidence, i.created_at, i.updated_at
"#;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct IncidentFilter {
    pub status: Option<IncidentStatus>,
    pub severity: Option<Severity>,
    pub incident_type: Option<String>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIncidentInput {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Incident type is required"))]
    pub incident_type: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, max = 200, message = "Location is required"))]
    pub location: String,
    pub camera_id: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateIncidentInput {
    #[validate(length(min = 1, max = 200, message = "Title must not be empty"))]
    pub title: Option<String>,
    pub incident_type: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub camera_id: Option<String>,
    pub severity: Option<Severity>,
    pub assigned_to: Option<Uuid>,
    pub evidence: Option<Vec<Evidence>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateInput {
    pub status: IncidentStatus,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NoteInput {
    #[validate(length(min = 1, max = 5000, message = "Note must not be empty"))]
    pub content: String,
}

impl IncidentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &IncidentFilter) -> AppResult<Vec<Incident>> {
        let incidents = sqlx::query_as::<_, Incident>(&format!(
            r#"
            SELECT {INCIDENT_COLUMNS}
            FROM incidents i
            LEFT JOIN users u ON u.id = i.reported_by
            WHERE ($1::text IS NULL OR i.status = $1)
              AND ($2::text IS NULL OR i.severity = $2)
              AND ($3::text IS NULL OR i.incident_type = $3)
              AND ($4::uuid IS NULL OR i.assigned_to = $4)
            ORDER BY i.created_at DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.severity.map(|s| s.as_str()))
        .bind(filter.incident_type.as_deref())
        .bind(filter.assigned_to)
        .fetch_all(&self.db)
        .await?;

        Ok(incidents)
    }

    pub async fn get(&self, incident_id: Uuid) -> AppResult<IncidentDetail> {
        let mut conn = self.db.acquire().await?;
        Self::fetch_detail(&mut conn, incident_id).await
    }

    async fn fetch(conn: &mut PgConnection, incident_id: Uuid) -> AppResult<Incident> {
        sqlx::query_as::<_, Incident>(&format!(
            r#"
            SELECT {INCIDENT_COLUMNS}
            FROM incidents i
            LEFT JOIN users u ON u.id = i.reported_by
            WHERE i.id = $1
            "#
        ))
        .bind(incident_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Incident".to_string()))
    }

    async fn fetch_detail(conn: &mut PgConnection, incident_id: Uuid) -> AppResult<IncidentDetail> {
        let incident = Self::fetch(&mut *conn, incident_id).await?;

        let notes = sqlx::query_as::<_, IncidentNote>(
            r#"
            SELECT n.id, n.author_id, u.name AS author_name, n.content, n.created_at
            FROM incident_notes n
            LEFT JOIN users u ON u.id = n.author_id
            WHERE n.incident_id = $1
            ORDER BY n.created_at ASC
            "#,
        )
        .bind(incident_id)
        .fetch_all(&mut *conn)
        .await?;

        let history = sqlx::query_as::<_, StatusChange>(
            r#"
            SELECT id, from_status, to_status, changed_by, comment, created_at
            FROM incident_status_history
            WHERE incident_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(incident_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(IncidentDetail {
            incident,
            notes,
            history,
        })
    }

    /// File an incident from a request body
    pub async fn create(
        &self,
        reporter: &AuthUser,
        input: CreateIncidentInput,
    ) -> AppResult<IncidentDetail> {
        let mut conn = self.db.acquire().await?;
        let incident_id = Self::insert(&mut conn, reporter.user_id, &input).await?;

        tracing::info!(
            incident_id = %incident_id,
            severity = %input.severity,
            reported_by = %reporter.user_id,
            "Incident filed"
        );
        Self::fetch_detail(&mut conn, incident_id).await
    }

    pub(crate) async fn insert(
        conn: &mut PgConnection,
        reporter_id: Uuid,
        input: &CreateIncidentInput,
    ) -> AppResult<Uuid> {
        let incident_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO incidents (title, incident_type, description, location, camera_id,
                                   severity, reported_by, assigned_to, evidence)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&input.title)
        .bind(&input.incident_type)
        .bind(&input.description)
        .bind(&input.location)
        .bind(&input.camera_id)
        .bind(input.severity.as_str())
        .bind(reporter_id)
        .bind(input.assigned_to)
        .bind(Json(&input.evidence))
        .fetch_one(&mut *conn)
        .await?;

        Ok(incident_id)
    }

    /// Apply allow-listed field changes; status goes through `update_status`
    pub async fn update(
        &self,
        incident_id: Uuid,
        input: UpdateIncidentInput,
    ) -> AppResult<IncidentDetail> {
        let mut conn = self.db.acquire().await?;

        let result = sqlx::query(
            r#"
            UPDATE incidents SET
                title = COALESCE($2, title),
                incident_type = COALESCE($3, incident_type),
                description = COALESCE($4, description),
                location = COALESCE($5, location),
                camera_id = COALESCE($6, camera_id),
                severity = COALESCE($7, severity),
                assigned_to = COALESCE($8, assigned_to),
                evidence = COALESCE($9, evidence),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(incident_id)
        .bind(&input.title)
        .bind(&input.incident_type)
        .bind(&input.description)
        .bind(&input.location)
        .bind(&input.camera_id)
        .bind(input.severity.map(|s| s.as_str()))
        .bind(input.assigned_to)
        .bind(input.evidence.as_ref().map(Json))
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Incident".to_string()));
        }

        Self::fetch_detail(&mut conn, incident_id).await
    }

    /// Set the status and append one history entry
    pub async fn update_status(
        &self,
        incident_id: Uuid,
        actor: &AuthUser,
        input: StatusUpdateInput,
    ) -> AppResult<IncidentDetail> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, String>(
            "SELECT status FROM incidents WHERE id = $1 FOR UPDATE",
        )
        .bind(incident_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Incident".to_string()))?;

        sqlx::query("UPDATE incidents SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(incident_id)
            .bind(input.status.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO incident_status_history (incident_id, from_status, to_status, changed_by, comment)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(incident_id)
        .bind(&current)
        .bind(input.status.as_str())
        .bind(actor.user_id)
        .bind(&input.comment)
        .execute(&mut *tx)
        .await?;

        let detail = Self::fetch_detail(&mut tx, incident_id).await?;
        tx.commit().await?;

        tracing::info!(
            incident_id = %incident_id,
            from = %current,
            to = %input.status,
            "Incident status updated"
        );
        Ok(detail)
    }

    pub async fn add_note(
        &self,
        incident_id: Uuid,
        author: &AuthUser,
        input: NoteInput,
    ) -> AppResult<IncidentDetail> {
        let mut conn = self.db.acquire().await?;
        // 404 before inserting
        Self::fetch(&mut conn, incident_id).await?;

        sqlx::query(
            "INSERT INTO incident_notes (incident_id, author_id, content) VALUES ($1, $2, $3)",
        )
        .bind(incident_id)
        .bind(author.user_id)
        .bind(&input.content)
        .execute(&mut *conn)
        .await?;

        Self::fetch_detail(&mut conn, incident_id).await
    }

    pub async fn delete(&self, incident_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(incident_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Incident".to_string()));
        }

        tracing::info!(incident_id = %incident_id, "Incident deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_input_defaults() {
        let input: CreateIncidentInput = serde_json::from_str(
            r#"{"title":"باب مفتوح","incident_type":"intrusion","description":"بوابة 3","location":"البوابة الشمالية"}"#,
        )
        .unwrap();
        assert_eq!(input.severity, Severity::Medium);
        assert!(input.evidence.is_empty());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_create_input_requires_title() {
        let input: CreateIncidentInput = serde_json::from_str(
            r#"{"title":"","incident_type":"intrusion","description":"x","location":"y"}"#,
        )
        .unwrap();
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
    }

    #[test]
    fn test_status_update_rejects_unknown_status() {
        assert!(serde_json::from_str::<StatusUpdateInput>(r#"{"status":"archived"}"#).is_err());
        let input: StatusUpdateInput =
            serde_json::from_str(r#"{"status":"in_progress","comment":"تم التحقق"}"#).unwrap();
        assert_eq!(input.status, IncidentStatus::InProgress);
    }
}
