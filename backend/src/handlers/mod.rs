//! HTTP handlers

pub mod auth;
pub mod call_report;
pub mod case;
pub mod dashboard;
pub mod health;
pub mod incident;
pub mod port_event;
pub mod report;
pub mod role;
pub mod user;
pub mod work_permit;

pub use auth::{login, me, refresh, register};
pub use call_report::{
    create_call_report, delete_call_report, escalate_call_report, get_call_report,
    list_call_reports, update_call_report,
};
pub use case::{create_case, delete_case, get_case, list_cases, update_case};
pub use dashboard::get_stats;
pub use health::health_check;
pub use incident::{
    add_incident_note, create_incident, delete_incident, export_incidents, get_incident,
    list_incidents, update_incident, update_incident_status,
};
pub use port_event::{
    create_port_event, delete_port_event, get_port_event, list_port_events, update_port_event,
};
pub use report::{
    create_report, delete_report, download_report, get_report, get_report_status, list_reports,
};
pub use role::{
    create_role, delete_role, get_role, list_permissions, list_roles, sync_permissions,
    update_role,
};
pub use user::{create_user, delete_user, get_user, list_users, update_user};
pub use work_permit::{
    create_work_permit, delete_work_permit, get_work_permit, list_work_permits,
    update_work_permit, update_work_permit_status,
};
