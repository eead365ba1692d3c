//! Dashboard statistics

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppResult;

#[derive(Clone)]
pub struct DashboardService {
    db: PgPool,
}

/// Headline numbers for the operations dashboard
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_incidents: i64,
    pub open_incidents: i64,
    pub incidents_by_status: BTreeMap<String, i64>,
    pub incidents_by_severity: BTreeMap<String, i64>,
    pub incidents_today: i64,
    pub open_cases: i64,
    pub pending_work_permits: i64,
    pub port_events_today: i64,
    pub calls_today: i64,
}

impl DashboardService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get_stats(&self) -> AppResult<DashboardStats> {
        let incidents_by_status: BTreeMap<String, i64> = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM incidents GROUP BY status",
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        let incidents_by_severity: BTreeMap<String, i64> = sqlx::query_as::<_, (String, i64)>(
            "SELECT severity, COUNT(*) FROM incidents GROUP BY severity",
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        let total_incidents: i64 = incidents_by_status.values().sum();
        let open_incidents: i64 = ["new", "in_progress"]
            .iter()
            .filter_map(|s| incidents_by_status.get(*s))
            .sum();

        // Activity recorded since midnight (server time)
        let (incidents_today, port_events_today, calls_today): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM incidents WHERE created_at >= CURRENT_DATE),
                (SELECT COUNT(*) FROM port_events WHERE event_date = CURRENT_DATE),
                (SELECT COUNT(*) FROM call_reports WHERE call_time >= CURRENT_DATE)
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let open_cases: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cases WHERE status <> 'closed'")
                .fetch_one(&self.db)
                .await?;

        let pending_work_permits: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM work_permits WHERE status = 'pending'")
                .fetch_one(&self.db)
                .await?;

        Ok(DashboardStats {
            total_incidents,
            open_incidents,
            incidents_by_status,
            incidents_by_severity,
            incidents_today,
            open_cases,
            pending_work_permits,
            port_events_today,
            calls_today,
        })
    }
}
