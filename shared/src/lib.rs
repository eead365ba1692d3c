//! Shared types and models for the security incident dashboard
//!
//! This crate contains the pieces used by both the backend and the browser
//! client (via WASM): domain enums, the role/permission resolver, route
//! guards and the client session store.

pub mod types;

pub mod guard;
pub mod models;
pub mod permissions;
pub mod session;
pub mod validation;

pub use models::*;
pub use permissions::{has_permission, HasPermissions, PermissionSet, RoleTable};
pub use types::*;
pub use validation::*;
