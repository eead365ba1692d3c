//! Call-center report service
//!
//! Calls can be escalated into incidents; the call then links to the incident
//! it produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::incident::{CreateIncidentInput, IncidentService};
use shared::models::{CallCategory, Severity};
use shared::validation::phone_rule;

#[derive(Clone)]
pub struct CallReportService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CallReport {
    pub id: Uuid,
    pub caller_name: String,
    pub caller_phone: String,
    pub call_time: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub category: CallCategory,
    pub summary: String,
    pub incident_id: Option<Uuid>,
    pub received_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const CALL_COLUMNS: &str = r#"
    id, caller_name, caller_phone, call_time, category, summary, incident_id,
    received_by, created_at, updated_at
"#;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallReportFilter {
    pub category: Option<CallCategory>,
    pub incident_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCallReportInput {
    #[validate(length(min = 1, max = 100, message = "Caller name is required"))]
    pub caller_name: String,
    #[validate(custom = "phone_rule")]
    pub caller_phone: String,
    /// Defaults to the time the report is recorded
    pub call_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: CallCategory,
    #[validate(length(min = 1, message = "Summary is required"))]
    pub summary: String,
    pub incident_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCallReportInput {
    pub caller_name: Option<String>,
    #[validate(custom = "phone_rule")]
    pub caller_phone: Option<String>,
    pub call_time: Option<DateTime<Utc>>,
    pub category: Option<CallCategory>,
    pub summary: Option<String>,
    pub incident_id: Option<Uuid>,
}

/// Details for the incident filed from a call
#[derive(Debug, Default, Deserialize, Validate)]
pub struct EscalateInput {
    #[validate(length(min = 1, max = 200, message = "Title must not be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Location must not be empty"))]
    pub location: Option<String>,
    pub severity: Option<Severity>,
}

/// Incident fields derived from a call
fn incident_from_call(call: &CallReport, input: &EscalateInput) -> CreateIncidentInput {
    let severity = input.severity.unwrap_or(match call.category {
        CallCategory::Emergency => Severity::High,
        _ => Severity::Medium,
    });

    CreateIncidentInput {
        title: input
            .title
            .clone()
            .unwrap_or_else(|| format!("{} - {}", call.category.label_ar(), call.caller_name)),
        incident_type: "call_center".to_string(),
        description: call.summary.clone(),
        location: input
            .location
            .clone()
            .unwrap_or_else(|| "مركز الاتصال".to_string()),
        camera_id: None,
        severity,
        assigned_to: None,
        evidence: Vec::new(),
    }
}

impl CallReportService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &CallReportFilter) -> AppResult<Vec<CallReport>> {
        let calls = sqlx::query_as::<_, CallReport>(&format!(
            r#"
            SELECT {CALL_COLUMNS}
            FROM call_reports
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::uuid IS NULL OR incident_id = $2)
            ORDER BY call_time DESC
            "#
        ))
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.incident_id)
        .fetch_all(&self.db)
        .await?;

        Ok(calls)
    }

    pub async fn get(&self, call_id: Uuid) -> AppResult<CallReport> {
        sqlx::query_as::<_, CallReport>(&format!(
            "SELECT {CALL_COLUMNS} FROM call_reports WHERE id = $1"
        ))
        .bind(call_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Call report".to_string()))
    }

    pub async fn create(
        &self,
        receiver: &AuthUser,
        input: CreateCallReportInput,
    ) -> AppResult<CallReport> {
        let call_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO call_reports (caller_name, caller_phone, call_time, category, summary,
                                      incident_id, received_by)
            VALUES ($1, $2, COALESCE($3, NOW()), $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&input.caller_name)
        .bind(&input.caller_phone)
        .bind(input.call_time)
        .bind(input.category.as_str())
        .bind(&input.summary)
        .bind(input.incident_id)
        .bind(receiver.user_id)
        .fetch_one(&self.db)
        .await?;

        self.get(call_id).await
    }

    pub async fn update(
        &self,
        call_id: Uuid,
        input: UpdateCallReportInput,
    ) -> AppResult<CallReport> {
        let result = sqlx::query(
            r#"
            UPDATE call_reports SET
                caller_name = COALESCE($2, caller_name),
                caller_phone = COALESCE($3, caller_phone),
                call_time = COALESCE($4, call_time),
                category = COALESCE($5, category),
                summary = COALESCE($6, summary),
                incident_id = COALESCE($7, incident_id),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(call_id)
        .bind(&input.caller_name)
        .bind(&input.caller_phone)
        .bind(input.call_time)
        .bind(input.category.map(|c| c.as_str()))
        .bind(&input.summary)
        .bind(input.incident_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Call report".to_string()));
        }

        self.get(call_id).await
    }

    pub async fn delete(&self, call_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM call_reports WHERE id = $1")
            .bind(call_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Call report".to_string()));
        }
        Ok(())
    }

    /// File an incident from the call and link it, in one transaction
    pub async fn escalate(
        &self,
        call_id: Uuid,
        actor: &AuthUser,
        input: EscalateInput,
    ) -> AppResult<CallReport> {
        let mut tx = self.db.begin().await?;

        // Lock the call so concurrent escalations serialize on it
        let call = sqlx::query_as::<_, CallReport>(&format!(
            "SELECT {CALL_COLUMNS} FROM call_reports WHERE id = $1 FOR UPDATE"
        ))
        .bind(call_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Call report".to_string()))?;
        if call.incident_id.is_some() {
            return Err(already_escalated());
        }

        let incident = incident_from_call(&call, &input);
        let incident_id = IncidentService::insert(&mut tx, actor.user_id, &incident).await?;

        let linked = sqlx::query(
            "UPDATE call_reports SET incident_id = $2, updated_at = NOW() WHERE id = $1 AND incident_id IS NULL",
        )
        .bind(call_id)
        .bind(incident_id)
        .execute(&mut *tx)
        .await?;
        if linked.rows_affected() == 0 {
            return Err(already_escalated());
        }
        tx.commit().await?;

        tracing::info!(call_id = %call_id, incident_id = %incident_id, "Call escalated to incident");
        self.get(call_id).await
    }
}

fn already_escalated() -> AppError {
    AppError::conflict(
        "call_report",
        "This call has already been escalated",
        "تم تصعيد هذا البلاغ مسبقاً",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(category: CallCategory) -> CallReport {
        CallReport {
            id: Uuid::new_v4(),
            caller_name: "سالم".to_string(),
            caller_phone: "0501234567".to_string(),
            call_time: Utc::now(),
            category,
            summary: "دخان بالقرب من المستودع 4".to_string(),
            incident_id: None,
            received_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_emergency_calls_escalate_as_high_severity() {
        let incident = incident_from_call(&call(CallCategory::Emergency), &EscalateInput::default());
        assert_eq!(incident.severity, Severity::High);
        assert_eq!(incident.incident_type, "call_center");
        assert_eq!(incident.description, "دخان بالقرب من المستودع 4");
        assert!(incident.title.contains("سالم"));
    }

    #[test]
    fn test_escalation_overrides() {
        let input = EscalateInput {
            title: Some("حريق".to_string()),
            location: Some("المستودع 4".to_string()),
            severity: Some(Severity::Critical),
        };
        let incident = incident_from_call(&call(CallCategory::Inquiry), &input);
        assert_eq!(incident.title, "حريق");
        assert_eq!(incident.location, "المستودع 4");
        assert_eq!(incident.severity, Severity::Critical);
    }
}
