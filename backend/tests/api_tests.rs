//! End-to-end API tests
//!
//! These drive the full router against a PostgreSQL database named by
//! `DATABASE_URL` and are ignored by default:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/incident_dashboard_test cargo test -- --ignored
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use incident_dashboard_backend::services::export::RenderOptions;
use incident_dashboard_backend::services::{PgReportStore, ReportQueue, ReportSettings};
use incident_dashboard_backend::{create_app, AppState, Config};

struct TestApp {
    router: Router,
    db: PgPool,
    _reports_dir: tempfile::TempDir,
}

async fn test_app() -> TestApp {
    let config = Config::load().expect("configuration");
    let db = PgPool::connect(&config.database.url)
        .await
        .expect("DATABASE_URL must point at a reachable database");
    sqlx::migrate!("./migrations").run(&db).await.expect("migrations");

    let reports_dir = tempfile::tempdir().unwrap();
    let (reports, _worker) = ReportQueue::start(
        Arc::new(PgReportStore::new(db.clone())),
        ReportSettings {
            output_dir: reports_dir.path().to_path_buf(),
            render: RenderOptions::default(),
        },
        8,
    );

    let state = AppState {
        db: db.clone(),
        config: Arc::new(config),
        reports,
    };

    TestApp {
        router: create_app(state),
        db,
        _reports_dir: reports_dir,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, headers, body)
    }

    async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let (status, _, bytes) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Register a fresh account and return its id and access token
    async fn register_user(&self, prefix: &str) -> (String, String, String) {
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        let email = format!("{}_{}@example.com", prefix, suffix);
        let (status, body) = self
            .json(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "username": format!("{}_{}", prefix, suffix),
                    "email": email,
                    "password": "secret1",
                    "name": prefix,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        let id = body["user"]["id"].as_str().unwrap().to_string();
        let token = body["token"].as_str().unwrap().to_string();
        (id, email, token)
    }

    /// Register a fresh account, promote it to admin and sign in again
    async fn admin_token(&self) -> String {
        let (_, email, _) = self.register_user("admin").await;

        sqlx::query("UPDATE users SET role_key = 'admin', permissions = ARRAY['all'] WHERE email = $1")
            .bind(&email)
            .execute(&self.db)
            .await
            .unwrap();

        let (status, body) = self
            .json(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}

fn permissions_of(user: &Value) -> Vec<String> {
    let mut tokens: Vec<String> = user["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap().to_string())
        .collect();
    tokens.sort();
    tokens
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_register_then_login() {
    let app = test_app().await;
    sqlx::query("DELETE FROM users WHERE email = 'bob@x.com' OR username = 'bob123'")
        .execute(&app.db)
        .await
        .unwrap();

    let (status, body) = app
        .json(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "username": "bob123",
                "email": "bob@x.com",
                "password": "secret1",
                "name": "Bob",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["role"], "camera_operator");

    let (status, body) = app
        .json(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "bob@x.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, me) = app.json("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "bob123");

    // Operators cannot manage users
    let (status, body) = app.json("GET", "/api/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"]["message_ar"].is_string());
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_protected_routes_require_token() {
    let app = test_app().await;

    let (status, body) = app.json("GET", "/api/incidents", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"]["code"].is_string());

    let (status, _) = app.json("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_repeated_status_update_records_each_call() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let (status, incident) = app
        .json(
            "POST",
            "/api/incidents",
            Some(&token),
            Some(json!({
                "title": "باب مفتوح",
                "incident_type": "intrusion",
                "description": "باب البوابة 2 مفتوح",
                "location": "البوابة 2",
                "severity": "high",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = incident["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (status, _) = app
            .json(
                "PATCH",
                &format!("/api/incidents/{}/status", id),
                Some(&token),
                Some(json!({ "status": "in_progress" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, detail) = app
        .json("GET", &format!("/api/incidents/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status"], "in_progress");
    assert_eq!(detail["history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_csv_report_lifecycle_and_download() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let (status, report) = app
        .json(
            "POST",
            "/api/reports?wait=true",
            Some(&token),
            Some(json!({
                "title": "daily incidents",
                "report_type": "incidents",
                "format": "csv",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["status"], "completed", "{}", report);
    let id = report["id"].as_str().unwrap().to_string();
    assert_eq!(report["file_url"], format!("/api/reports/{}/download", id));
    assert!(report.get("file_path").is_none());

    let (status, view) = app
        .json("GET", &format!("/api/reports/{}/status", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "completed");

    let request = Request::builder()
        .uri(format!("/api/reports/{}/download", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, headers, bytes) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("filename=\"daily incidents.csv\""));
    assert!(String::from_utf8_lossy(&bytes).contains("رقم البلاغ"));

    let (status, _) = app
        .json("DELETE", &format!("/api/reports/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_report_rejects_unknown_filter() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .json(
            "POST",
            "/api/reports",
            Some(&token),
            Some(json!({
                "title": "cases",
                "report_type": "cases",
                "format": "excel",
                "filters": { "severity": "high" },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "filters");
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_role_changes_reach_assigned_users() {
    let app = test_app().await;
    let admin = app.admin_token().await;
    let (user_id, _, user_token) = app.register_user("patrol").await;

    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    let (status, role) = app
        .json(
            "POST",
            "/api/roles",
            Some(&admin),
            Some(json!({
                "key": format!("patrol_{}", suffix),
                "name": format!("دورية {}", suffix),
                "permissions": ["view_incidents"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", role);
    let role_id = role["id"].as_str().unwrap().to_string();

    // Reassigning the user copies the new role's permissions
    let (status, user) = app
        .json(
            "PUT",
            &format!("/api/users/{}", user_id),
            Some(&admin),
            Some(json!({ "role": role["key"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", user);
    assert_eq!(user["role"], role["key"]);
    assert_eq!(permissions_of(&user), vec!["view_incidents"]);

    let (status, _) = app.json("GET", "/api/call-reports", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Editing the role re-syncs everyone assigned to it
    let (status, _) = app
        .json(
            "PUT",
            &format!("/api/roles/{}", role_id),
            Some(&admin),
            Some(json!({ "permissions": ["view_incidents", "view_call_reports"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, user) = app
        .json("GET", &format!("/api/users/{}", user_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(permissions_of(&user), vec!["view_call_reports", "view_incidents"]);

    // The token issued before the change sees the new permissions
    let (status, _) = app.json("GET", "/api/call-reports", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .json("DELETE", &format!("/api/roles/{}", role_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_deactivated_user_loses_access() {
    let app = test_app().await;
    let admin = app.admin_token().await;
    let (user_id, _, user_token) = app.register_user("guard").await;

    let (status, _) = app.json("GET", "/api/auth/me", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, user) = app
        .json(
            "PUT",
            &format!("/api/users/{}", user_id),
            Some(&admin),
            Some(json!({ "status": "inactive" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", user);

    let (status, body) = app.json("GET", "/api/auth/me", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "ACCOUNT_INACTIVE");
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_concurrent_escalations_file_one_incident() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let summary = format!("دخان قرب المستودع {}", Uuid::new_v4());
    let (status, call) = app
        .json(
            "POST",
            "/api/call-reports",
            Some(&token),
            Some(json!({
                "caller_name": "سالم",
                "caller_phone": "0501234567",
                "category": "emergency",
                "summary": summary,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", call);
    let uri = format!("/api/call-reports/{}/escalate", call["id"].as_str().unwrap());

    let (first, second) = tokio::join!(
        app.json("POST", &uri, Some(&token), None),
        app.json("POST", &uri, Some(&token), None),
    );
    let mut statuses = vec![first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);

    let filed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incidents WHERE description = $1")
        .bind(&summary)
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(filed, 1);
}

#[tokio::test]
#[ignore] // Requires database connection
async fn test_duplicate_permit_number_is_a_conflict() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let number = format!("WP-{}", &Uuid::new_v4().simple().to_string()[..8].to_uppercase());
    let permit = json!({
        "permit_number": number,
        "applicant_name": "شركة الخليج",
        "company": "الخليج للصيانة",
        "work_type": "welding",
        "location": "الرصيف 5",
        "start_date": "2024-06-01",
        "end_date": "2024-06-03",
    });

    let (first, second) = tokio::join!(
        app.json("POST", "/api/work-permits", Some(&token), Some(permit.clone())),
        app.json("POST", "/api/work-permits", Some(&token), Some(permit.clone())),
    );
    let mut statuses = vec![first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);

    let rejected = if first.0 == StatusCode::CONFLICT { first.1 } else { second.1 };
    assert_eq!(rejected["error"]["field"], "permit_number");
}
