//! Case management service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::models::{CasePriority, CaseStatus};

#[derive(Clone)]
pub struct CaseService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Case {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub case_type: String,
    #[sqlx(try_from = "String")]
    pub priority: CasePriority,
    #[sqlx(try_from = "String")]
    pub status: CaseStatus,
    pub created_by: Uuid,
    pub created_by_name: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const CASE_COLUMNS: &str = r#"
    c.id, c.title, c.description, c.case_type, c.priority, c.status,
    c.created_by, u.name AS created_by_name, c.assigned_to, c.created_at, c.updated_at
"#;

#[derive(Debug, Default, Deserialize)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
    pub case_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCaseInput {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, max = 100, message = "Case type is required"))]
    pub case_type: String,
    #[serde(default)]
    pub priority: CasePriority,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCaseInput {
    #[validate(length(min = 1, max = 200, message = "Title must not be empty"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub case_type: Option<String>,
    pub priority: Option<CasePriority>,
    pub status: Option<CaseStatus>,
    pub assigned_to: Option<Uuid>,
}

impl CaseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &CaseFilter) -> AppResult<Vec<Case>> {
        let cases = sqlx::query_as::<_, Case>(&format!(
            r#"
            SELECT {CASE_COLUMNS}
            FROM cases c
            LEFT JOIN users u ON u.id = c.created_by
            WHERE ($1::text IS NULL OR c.status = $1)
              AND ($2::text IS NULL OR c.priority = $2)
              AND ($3::text IS NULL OR c.case_type = $3)
            ORDER BY c.created_at DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.priority.map(|p| p.as_str()))
        .bind(filter.case_type.as_deref())
        .fetch_all(&self.db)
        .await?;

        Ok(cases)
    }

    pub async fn get(&self, case_id: Uuid) -> AppResult<Case> {
        sqlx::query_as::<_, Case>(&format!(
            r#"
            SELECT {CASE_COLUMNS}
            FROM cases c
            LEFT JOIN users u ON u.id = c.created_by
            WHERE c.id = $1
            "#
        ))
        .bind(case_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Case".to_string()))
    }

    pub async fn create(&self, creator: &AuthUser, input: CreateCaseInput) -> AppResult<Case> {
        let case_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO cases (title, description, case_type, priority, created_by, assigned_to)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.case_type)
        .bind(input.priority.as_str())
        .bind(creator.user_id)
        .bind(input.assigned_to)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(case_id = %case_id, created_by = %creator.user_id, "Case opened");
        self.get(case_id).await
    }

    /// Only the creator or an admin may change a case
    pub async fn update(
        &self,
        case_id: Uuid,
        actor: &AuthUser,
        input: UpdateCaseInput,
    ) -> AppResult<Case> {
        let existing = self.get(case_id).await?;
        if !actor.can_modify(existing.created_by) {
            return Err(AppError::InsufficientPermissions);
        }

        sqlx::query(
            r#"
            UPDATE cases SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                case_type = COALESCE($4, case_type),
                priority = COALESCE($5, priority),
                status = COALESCE($6, status),
                assigned_to = COALESCE($7, assigned_to),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(case_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.case_type)
        .bind(input.priority.map(|p| p.as_str()))
        .bind(input.status.map(|s| s.as_str()))
        .bind(input.assigned_to)
        .execute(&self.db)
        .await?;

        self.get(case_id).await
    }

    pub async fn delete(&self, case_id: Uuid, actor: &AuthUser) -> AppResult<()> {
        let existing = self.get(case_id).await?;
        if !actor.can_modify(existing.created_by) {
            return Err(AppError::InsufficientPermissions);
        }

        sqlx::query("DELETE FROM cases WHERE id = $1")
            .bind(case_id)
            .execute(&self.db)
            .await?;

        tracing::info!(case_id = %case_id, deleted_by = %actor.user_id, "Case deleted");
        Ok(())
    }
}
