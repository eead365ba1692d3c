//! Route definitions for the security incident dashboard API

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
///
/// Everything except registration, login, token refresh and health needs a
/// bearer token.
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/me", get(handlers::me))
        .nest("/users", user_routes())
        .nest("/roles", role_routes())
        .nest("/cases", case_routes())
        .nest("/incidents", incident_routes())
        .nest("/port-events", port_event_routes())
        .nest("/call-reports", call_report_routes())
        .nest("/work-permits", work_permit_routes())
        .nest("/reports", report_routes())
        .route("/dashboard/stats", get(handlers::get_stats))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes())
        .merge(protected)
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/:user_id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
}

fn role_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_roles).post(handlers::create_role))
        .route("/permissions", get(handlers::list_permissions))
        .route("/sync", post(handlers::sync_permissions))
        .route(
            "/:role_id",
            get(handlers::get_role)
                .put(handlers::update_role)
                .delete(handlers::delete_role),
        )
}

fn case_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_cases).post(handlers::create_case))
        .route(
            "/:case_id",
            get(handlers::get_case)
                .put(handlers::update_case)
                .patch(handlers::update_case)
                .delete(handlers::delete_case),
        )
}

fn incident_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_incidents).post(handlers::create_incident))
        .route("/export", get(handlers::export_incidents))
        .route(
            "/:incident_id",
            get(handlers::get_incident)
                .put(handlers::update_incident)
                .delete(handlers::delete_incident),
        )
        .route("/:incident_id/status", patch(handlers::update_incident_status))
        .route("/:incident_id/notes", post(handlers::add_incident_note))
}

fn port_event_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_port_events).post(handlers::create_port_event))
        .route(
            "/:event_id",
            get(handlers::get_port_event)
                .put(handlers::update_port_event)
                .delete(handlers::delete_port_event),
        )
}

fn call_report_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_call_reports).post(handlers::create_call_report))
        .route(
            "/:call_id",
            get(handlers::get_call_report)
                .put(handlers::update_call_report)
                .delete(handlers::delete_call_report),
        )
        .route("/:call_id/escalate", post(handlers::escalate_call_report))
}

fn work_permit_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_work_permits).post(handlers::create_work_permit))
        .route(
            "/:permit_id",
            get(handlers::get_work_permit)
                .put(handlers::update_work_permit)
                .delete(handlers::delete_work_permit),
        )
        .route("/:permit_id/status", patch(handlers::update_work_permit_status))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_reports).post(handlers::create_report))
        .route(
            "/:report_id",
            get(handlers::get_report).delete(handlers::delete_report),
        )
        .route("/:report_id/status", get(handlers::get_report_status))
        .route("/:report_id/download", get(handlers::download_report))
}
