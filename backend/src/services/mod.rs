//! Business logic services for the security incident dashboard

pub mod auth;
pub mod call_report;
pub mod case;
pub mod dashboard;
pub mod export;
pub mod incident;
pub mod port_event;
pub mod report;
pub mod report_queue;
pub mod role;
pub mod user;
pub mod work_permit;

pub use auth::AuthService;
pub use call_report::CallReportService;
pub use case::CaseService;
pub use dashboard::DashboardService;
pub use incident::IncidentService;
pub use port_event::PortEventService;
pub use report::{PgReportStore, ReportService};
pub use report_queue::{ReportQueue, ReportSettings};
pub use role::RoleService;
pub use user::UserService;
pub use work_permit::WorkPermitService;
