//! Work permit service
//!
//! Permits move `pending → approved | rejected` and `approved → expired`;
//! every other status change is rejected.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{duplicate_entry, AppError, AppResult};
use crate::middleware::AuthUser;
use shared::models::{validate_permit_window, PermitStatus};
use shared::validation::permit_number_rule;

#[derive(Clone)]
pub struct WorkPermitService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkPermit {
    pub id: Uuid,
    pub permit_number: String,
    pub applicant_name: String,
    pub company: String,
    pub work_type: String,
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: PermitStatus,
    pub notes: Option<String>,
    pub issued_by: Uuid,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PERMIT_COLUMNS: &str = r#"
    id, permit_number, applicant_name, company, work_type, location, start_date, end_date,
    status, notes, issued_by, decided_by, decided_at, created_at, updated_at
"#;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct WorkPermitFilter {
    pub status: Option<PermitStatus>,
    pub company: Option<String>,
    pub work_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkPermitInput {
    #[validate(custom = "permit_number_rule")]
    pub permit_number: String,
    #[validate(length(min = 1, max = 100, message = "Applicant name is required"))]
    pub applicant_name: String,
    #[validate(length(min = 1, max = 100, message = "Company is required"))]
    pub company: String,
    #[validate(length(min = 1, max = 100, message = "Work type is required"))]
    pub work_type: String,
    #[validate(length(min = 1, max = 200, message = "Location is required"))]
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateWorkPermitInput {
    pub applicant_name: Option<String>,
    pub company: Option<String>,
    pub work_type: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PermitStatusInput {
    pub status: PermitStatus,
    pub notes: Option<String>,
}

fn check_window(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    validate_permit_window(start, end).map_err(|message| {
        AppError::validation(
            "end_date",
            message,
            "يجب ألا يسبق تاريخ الانتهاء تاريخ البداية",
        )
    })
}

fn check_transition(from: PermitStatus, to: PermitStatus) -> AppResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::InvalidStateTransition(format!(
            "cannot move a permit from {} to {}",
            from, to
        )))
    }
}

impl WorkPermitService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &WorkPermitFilter) -> AppResult<Vec<WorkPermit>> {
        let permits = sqlx::query_as::<_, WorkPermit>(&format!(
            r#"
            SELECT {PERMIT_COLUMNS}
            FROM work_permits
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR company = $2)
              AND ($3::text IS NULL OR work_type = $3)
            ORDER BY created_at DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.company.as_deref())
        .bind(filter.work_type.as_deref())
        .fetch_all(&self.db)
        .await?;

        Ok(permits)
    }

    pub async fn get(&self, permit_id: Uuid) -> AppResult<WorkPermit> {
        sqlx::query_as::<_, WorkPermit>(&format!(
            "SELECT {PERMIT_COLUMNS} FROM work_permits WHERE id = $1"
        ))
        .bind(permit_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Work permit".to_string()))
    }

    pub async fn create(
        &self,
        issuer: &AuthUser,
        input: CreateWorkPermitInput,
    ) -> AppResult<WorkPermit> {
        check_window(input.start_date, input.end_date)?;

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM work_permits WHERE permit_number = $1",
        )
        .bind(&input.permit_number)
        .fetch_one(&self.db)
        .await?;

        if existing > 0 {
            return Err(AppError::DuplicateEntry("permit_number".to_string()));
        }

        let permit_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO work_permits (permit_number, applicant_name, company, work_type, location,
                                      start_date, end_date, notes, issued_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&input.permit_number)
        .bind(&input.applicant_name)
        .bind(&input.company)
        .bind(&input.work_type)
        .bind(&input.location)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.notes)
        .bind(issuer.user_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| duplicate_entry(e, &["permit_number"]))?;

        tracing::info!(permit_id = %permit_id, permit_number = %input.permit_number, "Work permit issued");
        self.get(permit_id).await
    }

    pub async fn update(
        &self,
        permit_id: Uuid,
        input: UpdateWorkPermitInput,
    ) -> AppResult<WorkPermit> {
        let existing = self.get(permit_id).await?;
        check_window(
            input.start_date.unwrap_or(existing.start_date),
            input.end_date.unwrap_or(existing.end_date),
        )?;

        sqlx::query(
            r#"
            UPDATE work_permits SET
                applicant_name = COALESCE($2, applicant_name),
                company = COALESCE($3, company),
                work_type = COALESCE($4, work_type),
                location = COALESCE($5, location),
                start_date = COALESCE($6, start_date),
                end_date = COALESCE($7, end_date),
                notes = COALESCE($8, notes),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(permit_id)
        .bind(&input.applicant_name)
        .bind(&input.company)
        .bind(&input.work_type)
        .bind(&input.location)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.notes)
        .execute(&self.db)
        .await?;

        self.get(permit_id).await
    }

    /// Apply a status transition and record who decided it
    pub async fn update_status(
        &self,
        permit_id: Uuid,
        actor: &AuthUser,
        input: PermitStatusInput,
    ) -> AppResult<WorkPermit> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, String>(
            "SELECT status FROM work_permits WHERE id = $1 FOR UPDATE",
        )
        .bind(permit_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Work permit".to_string()))?;

        let current = PermitStatus::try_from(current)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        check_transition(current, input.status)?;

        sqlx::query(
            r#"
            UPDATE work_permits SET
                status = $2,
                notes = COALESCE($3, notes),
                decided_by = $4,
                decided_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(permit_id)
        .bind(input.status.as_str())
        .bind(&input.notes)
        .bind(actor.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(permit_id = %permit_id, from = %current, to = %input.status, "Permit status changed");
        self.get(permit_id).await
    }

    pub async fn delete(&self, permit_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM work_permits WHERE id = $1")
            .bind(permit_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Work permit".to_string()));
        }
        Ok(())
    }
}
