//! Domain models for the security incident dashboard

mod call_report;
mod case;
mod incident;
mod port_event;
mod report;
mod role;
mod user;
mod work_permit;

pub use call_report::*;
pub use case::*;
pub use incident::*;
pub use port_event::*;
pub use report::*;
pub use role::*;
pub use user::*;
pub use work_permit::*;
