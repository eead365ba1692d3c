//! Role definitions

use serde::{Deserialize, Serialize};

use crate::permissions::{self, PermissionSet};

pub const ADMIN_ROLE: &str = "admin";
pub const MANAGER_ROLE: &str = "manager";
pub const CAMERA_OPERATOR_ROLE: &str = "camera_operator";

/// Role assigned to self-registered accounts
pub const DEFAULT_ROLE: &str = CAMERA_OPERATOR_ROLE;

/// A role as seen by the permission resolver.
///
/// `key` is the stable identifier users reference; `name` is the Arabic
/// display label and may change freely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleDefinition {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub permissions: PermissionSet,
    #[serde(default)]
    pub is_system: bool,
}

impl RoleDefinition {
    pub fn new(key: &str, name: &str, permissions: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            description: None,
            permissions: permissions.iter().copied().collect(),
            is_system: false,
        }
    }
}

/// Roles seeded on a fresh installation
pub fn default_roles() -> Vec<RoleDefinition> {
    use permissions::*;

    vec![
        RoleDefinition {
            description: Some("صلاحيات كاملة على النظام".to_string()),
            is_system: true,
            ..RoleDefinition::new(ADMIN_ROLE, "أدمن", &[ALL])
        },
        RoleDefinition {
            description: Some("إدارة البلاغات والقضايا والتقارير".to_string()),
            is_system: true,
            ..RoleDefinition::new(
                MANAGER_ROLE,
                "مدير",
                &[
                    VIEW_DASHBOARD,
                    VIEW_INCIDENTS,
                    CREATE_INCIDENTS,
                    MANAGE_INCIDENTS,
                    VIEW_CASES,
                    MANAGE_CASES,
                    VIEW_PORT_EVENTS,
                    MANAGE_PORT_EVENTS,
                    VIEW_CALL_REPORTS,
                    MANAGE_CALL_REPORTS,
                    VIEW_WORK_PERMITS,
                    MANAGE_WORK_PERMITS,
                    VIEW_REPORTS,
                    MANAGE_REPORTS,
                    EXPORT_DATA,
                    VIEW_USERS,
                ],
            )
        },
        RoleDefinition {
            description: Some("مراقبة الكاميرات وتسجيل البلاغات".to_string()),
            is_system: true,
            ..RoleDefinition::new(
                CAMERA_OPERATOR_ROLE,
                "مشغل كاميرات",
                &[
                    VIEW_DASHBOARD,
                    VIEW_INCIDENTS,
                    CREATE_INCIDENTS,
                    VIEW_PORT_EVENTS,
                    VIEW_CALL_REPORTS,
                    MANAGE_CALL_REPORTS,
                ],
            )
        },
    ]
}
