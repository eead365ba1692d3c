//! Generated reports
//!
//! A report row is created `pending` and handed to the [`ReportQueue`]; the
//! [`PgReportStore`] is the queue's view of the database. Data sets come from
//! the resource services so reports honor the same filters as the list
//! endpoints.
//!
//! [`ReportQueue`]: crate::services::report_queue::ReportQueue

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::call_report::{CallReportFilter, CallReportService};
use crate::services::case::{CaseFilter, CaseService};
use crate::services::export::{self, Table};
use crate::services::incident::{IncidentFilter, IncidentService};
use crate::services::port_event::{PortEventFilter, PortEventService};
use crate::services::report_queue::{ReportJob, ReportStore};
use crate::services::work_permit::{WorkPermitFilter, WorkPermitService};
use shared::models::{ReportFormat, ReportStatus, ReportType};
use shared::types::DateRange;

#[derive(Clone)]
pub struct ReportService {
    db: PgPool,
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    title: String,
    #[sqlx(try_from = "String")]
    report_type: ReportType,
    #[sqlx(try_from = "String")]
    format: ReportFormat,
    #[sqlx(try_from = "String")]
    status: ReportStatus,
    date_start: Option<NaiveDate>,
    date_end: Option<NaiveDate>,
    filters: Json<Map<String, Value>>,
    file_path: Option<String>,
    file_url: Option<String>,
    error: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub status: ReportStatus,
    pub date_range: Option<DateRange>,
    pub filters: Map<String, Value>,
    #[serde(skip_serializing)]
    pub file_path: Option<String>,
    pub file_url: Option<String>,
    pub error: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<ReportRow> for Report {
    fn from(row: ReportRow) -> Self {
        let date_range = match (row.date_start, row.date_end) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };
        Self {
            id: row.id,
            title: row.title,
            report_type: row.report_type,
            format: row.format,
            status: row.status,
            date_range,
            filters: row.filters.0,
            file_path: row.file_path,
            file_url: row.file_url,
            error: row.error,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        }
    }
}

impl Report {
    pub fn job(&self) -> ReportJob {
        ReportJob {
            report_id: self.id,
            title: self.title.clone(),
            report_type: self.report_type,
            format: self.format,
            date_range: self.date_range.clone(),
            filters: self.filters.clone(),
        }
    }
}

/// Polling view of a report
#[derive(Debug, Serialize)]
pub struct ReportStatusView {
    pub id: Uuid,
    pub status: ReportStatus,
    pub file_url: Option<String>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Report> for ReportStatusView {
    fn from(report: &Report) -> Self {
        Self {
            id: report.id,
            status: report.status,
            file_url: report.file_url.clone(),
            error: report.error.clone(),
            completed_at: report.completed_at,
        }
    }
}

const REPORT_COLUMNS: &str = r#"
    id, title, report_type, format, status, date_start, date_end, filters,
    file_path, file_url, error, created_by, created_at, updated_at, completed_at
"#;

#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub report_type: Option<ReportType>,
    pub format: Option<ReportFormat>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReportInput {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

/// Equality filters accepted for each data set
pub fn allowed_filters(report_type: ReportType) -> &'static [&'static str] {
    match report_type {
        ReportType::Incidents => &["status", "severity", "incident_type", "assigned_to"],
        ReportType::Cases => &["status", "priority", "case_type"],
        ReportType::PortEvents => &["event_date", "port_name", "event_type", "status"],
        ReportType::WorkPermits => &["status", "company", "work_type"],
        ReportType::CallReports => &["category", "incident_id"],
    }
}

/// Decode the stored filter object into a service filter
fn parse_filters<F: DeserializeOwned>(
    report_type: ReportType,
    filters: &Map<String, Value>,
) -> AppResult<F> {
    let allowed = allowed_filters(report_type);
    if let Some(key) = filters.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(AppError::validation(
            "filters",
            format!("Unknown filter '{}' for {} reports", key, report_type),
            format!("عامل التصفية '{}' غير مدعوم لهذا التقرير", key),
        ));
    }

    serde_json::from_value(Value::Object(filters.clone())).map_err(|e| {
        AppError::validation(
            "filters",
            format!("Invalid filter value: {}", e),
            "قيمة عامل التصفية غير صالحة",
        )
    })
}

fn check_filters(report_type: ReportType, filters: &Map<String, Value>) -> AppResult<()> {
    match report_type {
        ReportType::Incidents => parse_filters::<IncidentFilter>(report_type, filters).map(drop),
        ReportType::Cases => parse_filters::<CaseFilter>(report_type, filters).map(drop),
        ReportType::PortEvents => parse_filters::<PortEventFilter>(report_type, filters).map(drop),
        ReportType::WorkPermits => parse_filters::<WorkPermitFilter>(report_type, filters).map(drop),
        ReportType::CallReports => parse_filters::<CallReportFilter>(report_type, filters).map(drop),
    }
}

fn check_date_range(range: Option<&DateRange>) -> AppResult<()> {
    match range {
        Some(range) if !range.is_valid() => Err(AppError::validation(
            "date_range",
            "Start date must not be after end date",
            "يجب ألا يتجاوز تاريخ البداية تاريخ النهاية",
        )),
        _ => Ok(()),
    }
}

fn in_range(range: Option<&DateRange>, created_at: DateTime<Utc>) -> bool {
    range.map_or(true, |r| r.contains(created_at.date_naive()))
}

impl ReportService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &ReportFilter) -> AppResult<Vec<Report>> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            SELECT {REPORT_COLUMNS}
            FROM reports
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR report_type = $2)
              AND ($3::text IS NULL OR format = $3)
            ORDER BY created_at DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.report_type.map(|t| t.as_str()))
        .bind(filter.format.map(|f| f.as_str()))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Report::from).collect())
    }

    pub async fn get(&self, report_id: Uuid) -> AppResult<Report> {
        sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"
        ))
        .bind(report_id)
        .fetch_optional(&self.db)
        .await?
        .map(Report::from)
        .ok_or_else(|| AppError::NotFound("Report".to_string()))
    }

    /// Record a pending report; the caller queues its job
    pub async fn create(&self, creator: &AuthUser, input: CreateReportInput) -> AppResult<Report> {
        check_date_range(input.date_range.as_ref())?;
        check_filters(input.report_type, &input.filters)?;

        let report_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO reports (title, report_type, format, date_start, date_end, filters, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&input.title)
        .bind(input.report_type.as_str())
        .bind(input.format.as_str())
        .bind(input.date_range.as_ref().map(|r| r.start))
        .bind(input.date_range.as_ref().map(|r| r.end))
        .bind(Json(&input.filters))
        .bind(creator.user_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            report_id = %report_id,
            report_type = %input.report_type,
            format = %input.format,
            "Report requested"
        );
        self.get(report_id).await
    }

    /// The finished document and its metadata
    pub async fn download(&self, report_id: Uuid) -> AppResult<(Report, Vec<u8>)> {
        let report = self.get(report_id).await?;

        let path = match (&report.status, &report.file_path) {
            (ReportStatus::Completed, Some(path)) => path.clone(),
            _ => {
                return Err(AppError::conflict(
                    "report",
                    format!("Report is {}, not completed", report.status),
                    format!("التقرير {} ولم يكتمل بعد", report.status.label_ar()),
                ))
            }
        };

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            tracing::error!(report_id = %report_id, path = %path, error = %e, "Report file unreadable");
            AppError::StorageError(e.to_string())
        })?;

        Ok((report, bytes))
    }

    pub async fn delete(&self, report_id: Uuid) -> AppResult<()> {
        let file_path = sqlx::query_scalar::<_, Option<String>>(
            "DELETE FROM reports WHERE id = $1 RETURNING file_path",
        )
        .bind(report_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Report".to_string()))?;

        if let Some(path) = file_path {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(report_id = %report_id, path = %path, error = %e, "Could not remove report file")
                }
            }
        }

        Ok(())
    }
}

/// Database side of the report worker
#[derive(Clone)]
pub struct PgReportStore {
    db: PgPool,
}

impl PgReportStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn transition(&self, report_id: Uuid, to: ReportStatus) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE reports SET status = $2, updated_at = NOW() WHERE id = $1 AND status = ANY($3)",
        )
        .bind(report_id)
        .bind(to.as_str())
        .bind(sources(to))
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Report".to_string()));
        }
        Ok(())
    }
}

/// Statuses a report may leave for `to`
fn sources(to: ReportStatus) -> Vec<&'static str> {
    ReportStatus::ALL
        .iter()
        .filter(|from| from.can_transition_to(to))
        .map(ReportStatus::as_str)
        .collect()
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn mark_generating(&self, report_id: Uuid) -> AppResult<()> {
        self.transition(report_id, ReportStatus::Generating).await
    }

    async fn load_table(&self, job: &ReportJob) -> AppResult<Table> {
        let range = job.date_range.as_ref();
        let db = self.db.clone();

        let table = match job.report_type {
            ReportType::Incidents => {
                let filter: IncidentFilter = parse_filters(job.report_type, &job.filters)?;
                let mut rows = IncidentService::new(db).list(&filter).await?;
                rows.retain(|r| in_range(range, r.created_at));
                export::incident_table(&job.title, &rows)
            }
            ReportType::Cases => {
                let filter: CaseFilter = parse_filters(job.report_type, &job.filters)?;
                let mut rows = CaseService::new(db).list(&filter).await?;
                rows.retain(|r| in_range(range, r.created_at));
                export::case_table(&job.title, &rows)
            }
            ReportType::PortEvents => {
                let filter: PortEventFilter = parse_filters(job.report_type, &job.filters)?;
                let mut rows = PortEventService::new(db).list(&filter).await?;
                rows.retain(|r| in_range(range, r.created_at));
                export::port_event_table(&job.title, &rows)
            }
            ReportType::WorkPermits => {
                let filter: WorkPermitFilter = parse_filters(job.report_type, &job.filters)?;
                let mut rows = WorkPermitService::new(db).list(&filter).await?;
                rows.retain(|r| in_range(range, r.created_at));
                export::work_permit_table(&job.title, &rows)
            }
            ReportType::CallReports => {
                let filter: CallReportFilter = parse_filters(job.report_type, &job.filters)?;
                let mut rows = CallReportService::new(db).list(&filter).await?;
                rows.retain(|r| in_range(range, r.created_at));
                export::call_report_table(&job.title, &rows)
            }
        };

        tracing::debug!(report_id = %job.report_id, rows = table.rows.len(), "Report data loaded");
        Ok(table)
    }

    async fn mark_completed(&self, report_id: Uuid, file_path: &str, file_url: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE reports SET
                status = $4,
                file_path = $2,
                file_url = $3,
                error = NULL,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($5)
            "#,
        )
        .bind(report_id)
        .bind(file_path)
        .bind(file_url)
        .bind(ReportStatus::Completed.as_str())
        .bind(sources(ReportStatus::Completed))
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Report".to_string()));
        }
        Ok(())
    }

    async fn mark_failed(&self, report_id: Uuid, error: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE reports SET status = $3, error = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($4)
            "#,
        )
        .bind(report_id)
        .bind(error)
        .bind(ReportStatus::Failed.as_str())
        .bind(sources(ReportStatus::Failed))
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use shared::models::Severity;

    fn filters(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_lifecycle_sources() {
        assert_eq!(sources(ReportStatus::Generating), vec!["pending"]);
        assert_eq!(sources(ReportStatus::Completed), vec!["generating"]);
        assert_eq!(sources(ReportStatus::Failed), vec!["pending", "generating"]);
        assert!(sources(ReportStatus::Pending).is_empty());
    }

    #[test]
    fn test_known_filters_decode_into_service_filter() {
        let parsed: IncidentFilter = parse_filters(
            ReportType::Incidents,
            &filters(json!({ "severity": "high", "incident_type": "fire" })),
        )
        .unwrap();
        assert_eq!(parsed.severity, Some(Severity::High));
        assert_eq!(parsed.incident_type.as_deref(), Some("fire"));
        assert!(parsed.status.is_none());
    }

    #[test]
    fn test_unknown_filter_key_is_rejected() {
        let err = check_filters(ReportType::Cases, &filters(json!({ "severity": "high" }))).unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "filters"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_filter_value_is_rejected() {
        assert!(check_filters(ReportType::Incidents, &filters(json!({ "status": "archived" }))).is_err());
        assert!(check_filters(ReportType::CallReports, &filters(json!({ "incident_id": "nope" }))).is_err());
        assert!(check_filters(ReportType::WorkPermits, &Map::new()).is_ok());
    }

    #[test]
    fn test_date_range_checks() {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        assert!(check_date_range(None).is_ok());
        assert!(check_date_range(Some(&DateRange { start, end })).is_ok());
        assert!(check_date_range(Some(&DateRange { start: end, end: start })).is_err());

        let range = DateRange { start, end };
        let inside = Utc.with_ymd_and_hms(2024, 5, 31, 23, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(in_range(Some(&range), inside));
        assert!(!in_range(Some(&range), outside));
        assert!(in_range(None, outside));
    }

    #[test]
    fn test_report_serialization_hides_file_path() {
        let report = Report {
            id: Uuid::new_v4(),
            title: "تقرير".to_string(),
            report_type: ReportType::Incidents,
            format: ReportFormat::Csv,
            status: ReportStatus::Completed,
            date_range: None,
            filters: Map::new(),
            file_path: Some("reports/x.csv".to_string()),
            file_url: Some("/api/reports/x/download".to_string()),
            error: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("file_path").is_none());
        assert_eq!(json["status"], "completed");
        assert_eq!(json["format"], "csv");

        let job = report.job();
        assert_eq!(job.report_id, report.id);
        assert_eq!(job.format, ReportFormat::Csv);
    }
}
