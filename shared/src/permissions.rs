//! Role and permission resolution
//!
//! Permissions are flat, opaque tokens. A user's effective permissions are
//! those of their role; the `"all"` token grants every capability. The same
//! resolver runs on the server and, compiled to WASM, in the browser.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RoleDefinition;

/// Sentinel token granting unconditional access
pub const ALL: &str = "all";

pub const VIEW_DASHBOARD: &str = "view_dashboard";
pub const VIEW_INCIDENTS: &str = "view_incidents";
pub const CREATE_INCIDENTS: &str = "create_incidents";
pub const MANAGE_INCIDENTS: &str = "manage_incidents";
pub const VIEW_CASES: &str = "view_cases";
pub const MANAGE_CASES: &str = "manage_cases";
pub const VIEW_PORT_EVENTS: &str = "view_port_events";
pub const MANAGE_PORT_EVENTS: &str = "manage_port_events";
pub const VIEW_CALL_REPORTS: &str = "view_call_reports";
pub const MANAGE_CALL_REPORTS: &str = "manage_call_reports";
pub const VIEW_WORK_PERMITS: &str = "view_work_permits";
pub const MANAGE_WORK_PERMITS: &str = "manage_work_permits";
pub const VIEW_REPORTS: &str = "view_reports";
pub const MANAGE_REPORTS: &str = "manage_reports";
pub const EXPORT_DATA: &str = "export_data";
pub const VIEW_USERS: &str = "view_users";
pub const MANAGE_USERS: &str = "manage_users";
pub const MANAGE_ROLES: &str = "manage_roles";

/// A grantable permission with its display labels
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PermissionInfo {
    pub token: &'static str,
    pub label_ar: &'static str,
    pub label_en: &'static str,
}

/// Every permission token an administrator can assign to a role
pub const CATALOGUE: &[PermissionInfo] = &[
    PermissionInfo { token: ALL, label_ar: "كل الصلاحيات", label_en: "Full access" },
    PermissionInfo { token: VIEW_DASHBOARD, label_ar: "عرض لوحة التحكم", label_en: "View dashboard" },
    PermissionInfo { token: VIEW_INCIDENTS, label_ar: "عرض البلاغات", label_en: "View incidents" },
    PermissionInfo { token: CREATE_INCIDENTS, label_ar: "إنشاء البلاغات", label_en: "File incidents" },
    PermissionInfo { token: MANAGE_INCIDENTS, label_ar: "إدارة البلاغات", label_en: "Manage incidents" },
    PermissionInfo { token: VIEW_CASES, label_ar: "عرض القضايا", label_en: "View cases" },
    PermissionInfo { token: MANAGE_CASES, label_ar: "إدارة القضايا", label_en: "Manage cases" },
    PermissionInfo { token: VIEW_PORT_EVENTS, label_ar: "عرض أحداث الميناء", label_en: "View port events" },
    PermissionInfo { token: MANAGE_PORT_EVENTS, label_ar: "إدارة أحداث الميناء", label_en: "Manage port events" },
    PermissionInfo { token: VIEW_CALL_REPORTS, label_ar: "عرض بلاغات مركز الاتصال", label_en: "View call-center reports" },
    PermissionInfo { token: MANAGE_CALL_REPORTS, label_ar: "إدارة بلاغات مركز الاتصال", label_en: "Manage call-center reports" },
    PermissionInfo { token: VIEW_WORK_PERMITS, label_ar: "عرض تصاريح العمل", label_en: "View work permits" },
    PermissionInfo { token: MANAGE_WORK_PERMITS, label_ar: "إدارة تصاريح العمل", label_en: "Manage work permits" },
    PermissionInfo { token: VIEW_REPORTS, label_ar: "عرض التقارير", label_en: "View reports" },
    PermissionInfo { token: MANAGE_REPORTS, label_ar: "إنشاء التقارير", label_en: "Generate reports" },
    PermissionInfo { token: EXPORT_DATA, label_ar: "تصدير البيانات", label_en: "Export data" },
    PermissionInfo { token: VIEW_USERS, label_ar: "عرض المستخدمين", label_en: "View users" },
    PermissionInfo { token: MANAGE_USERS, label_ar: "إدارة المستخدمين", label_en: "Manage users" },
    PermissionInfo { token: MANAGE_ROLES, label_ar: "إدارة الأدوار", label_en: "Manage roles" },
];

/// Check whether a token is part of the catalogue
pub fn is_known_permission(token: &str) -> bool {
    CATALOGUE.iter().any(|p| p.token == token)
}

/// A flat set of permission tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The unrestricted set holding only the `"all"` token
    pub fn unrestricted() -> Self {
        [ALL].into_iter().collect()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.contains(ALL)
    }

    /// Whether this set grants `required`
    pub fn grants(&self, required: &str) -> bool {
        self.is_unrestricted() || self.contains(required)
    }

    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        self.0.insert(token.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Tokens not present in the catalogue
    pub fn unknown_tokens(&self) -> Vec<&str> {
        self.iter().filter(|t| !is_known_permission(t)).collect()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl From<Vec<String>> for PermissionSet {
    fn from(tokens: Vec<String>) -> Self {
        Self(tokens.into_iter().collect())
    }
}

impl FromIterator<String> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

/// Anything carrying an effective permission set
pub trait HasPermissions {
    fn permissions(&self) -> &PermissionSet;
}

impl HasPermissions for PermissionSet {
    fn permissions(&self) -> &PermissionSet {
        self
    }
}

/// Returns `true` when `user` holds `"all"` or `required`
pub fn has_permission<U: HasPermissions + ?Sized>(user: &U, required: &str) -> bool {
    user.permissions().grants(required)
}

/// Snapshot of the role table used to resolve permissions
#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    roles: Vec<RoleDefinition>,
}

impl RoleTable {
    pub fn new(roles: Vec<RoleDefinition>) -> Self {
        Self { roles }
    }

    pub fn roles(&self) -> &[RoleDefinition] {
        &self.roles
    }

    pub fn get_by_key(&self, key: &str) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.key == key)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.name == name)
    }

    /// Permissions of the role with this display name; empty when unknown
    pub fn get_permissions_by_role_name(&self, name: &str) -> PermissionSet {
        self.get_by_name(name)
            .map(|r| r.permissions.clone())
            .unwrap_or_default()
    }

    /// Permissions of the role with this key; empty when unknown
    pub fn get_permissions_by_role_key(&self, key: &str) -> PermissionSet {
        self.get_by_key(key)
            .map(|r| r.permissions.clone())
            .unwrap_or_default()
    }

    /// Display label for a role key, falling back to the key itself
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.get_by_key(key).map(|r| r.name.as_str()).unwrap_or(key)
    }
}

/// The permission-relevant slice of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissions {
    pub user_id: Uuid,
    /// Role key
    pub role: String,
    pub permissions: PermissionSet,
}

impl HasPermissions for UserPermissions {
    fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }
}

/// A user whose cached permissions differ from their role's
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionUpdate {
    pub user_id: Uuid,
    pub permissions: PermissionSet,
}

/// Outcome of a synchronization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub checked: usize,
    pub updated: usize,
}

/// Compute the updates needed to bring every user in line with the role table
pub fn plan_permission_sync(users: &[UserPermissions], table: &RoleTable) -> Vec<PermissionUpdate> {
    users
        .iter()
        .filter_map(|user| {
            let expected = table.get_permissions_by_role_key(&user.role);
            (expected != user.permissions).then(|| PermissionUpdate {
                user_id: user.user_id,
                permissions: expected,
            })
        })
        .collect()
}

/// Recompute and overwrite every user's cached permissions in place
pub fn sync_user_permissions_with_roles(
    users: &mut [UserPermissions],
    table: &RoleTable,
) -> SyncReport {
    let mut report = SyncReport {
        checked: users.len(),
        updated: 0,
    };

    for user in users.iter_mut() {
        let expected = table.get_permissions_by_role_key(&user.role);
        if expected != user.permissions {
            user.permissions = expected;
            report.updated += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_roles;

    fn user(role: &str, tokens: &[&str]) -> UserPermissions {
        UserPermissions {
            user_id: Uuid::new_v4(),
            role: role.to_string(),
            permissions: tokens.iter().copied().collect(),
        }
    }

    #[test]
    fn test_lookup_by_name_returns_role_permissions() {
        let table = RoleTable::new(default_roles());
        let manager = table.get_by_key("manager").unwrap();
        assert_eq!(table.get_permissions_by_role_name("مدير"), manager.permissions);
    }

    #[test]
    fn test_unknown_role_denies_by_default() {
        let table = RoleTable::new(default_roles());
        assert!(table.get_permissions_by_role_name("مشرف").is_empty());
        assert!(table.get_permissions_by_role_key("supervisor").is_empty());
    }

    #[test]
    fn test_all_short_circuits_every_check() {
        let admin = PermissionSet::unrestricted();
        assert!(has_permission(&admin, MANAGE_ROLES));
        assert!(has_permission(&admin, "anything_at_all"));
    }

    #[test]
    fn test_membership_without_all() {
        let operator: PermissionSet = [VIEW_INCIDENTS, CREATE_INCIDENTS].into_iter().collect();
        assert!(has_permission(&operator, VIEW_INCIDENTS));
        assert!(!has_permission(&operator, MANAGE_INCIDENTS));
    }

    #[test]
    fn test_no_hierarchy_between_tokens() {
        let manager: PermissionSet = [MANAGE_INCIDENTS].into_iter().collect();
        assert!(!has_permission(&manager, VIEW_INCIDENTS));
    }

    #[test]
    fn test_sync_overwrites_stale_permissions() {
        let table = RoleTable::new(default_roles());
        let mut users = vec![
            user("camera_operator", &[MANAGE_USERS]),
            user("admin", &[ALL]),
            user("retired_role", &[VIEW_DASHBOARD]),
        ];

        let report = sync_user_permissions_with_roles(&mut users, &table);

        assert_eq!(report, SyncReport { checked: 3, updated: 2 });
        for u in &users {
            assert_eq!(u.permissions, table.get_permissions_by_role_key(&u.role));
        }
        assert!(users[2].permissions.is_empty());
    }

    #[test]
    fn test_plan_only_lists_changed_users() {
        let table = RoleTable::new(default_roles());
        let in_sync = user("admin", &[ALL]);
        let stale = user("manager", &[]);

        let plan = plan_permission_sync(&[in_sync, stale.clone()], &table);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].user_id, stale.user_id);
        assert_eq!(plan[0].permissions, table.get_permissions_by_role_key("manager"));
    }

    #[test]
    fn test_renamed_role_still_resolves_by_key() {
        let mut roles = default_roles();
        roles[1].name = "مدير العمليات".to_string();
        let table = RoleTable::new(roles);

        assert!(table.get_permissions_by_role_name("مدير").is_empty());
        assert!(!table.get_permissions_by_role_key("manager").is_empty());
        assert_eq!(table.display_name("manager"), "مدير العمليات");
    }

    #[test]
    fn test_default_role_permissions_are_catalogued() {
        for role in default_roles() {
            assert!(role.permissions.unknown_tokens().is_empty(), "{}", role.key);
        }
        let bogus: PermissionSet = ["fly_drones"].into_iter().collect();
        assert_eq!(bogus.unknown_tokens(), vec!["fly_drones"]);
    }

    #[test]
    fn test_permission_set_serializes_as_array() {
        let set: PermissionSet = [VIEW_USERS, ALL].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["all","view_users"]"#);
    }

    mod properties {
        use super::super::*;
        use proptest::prelude::*;

        fn catalogued_tokens() -> impl Strategy<Value = Vec<&'static str>> {
            prop::sample::subsequence(CATALOGUE.iter().map(|p| p.token).collect::<Vec<_>>(), 0..CATALOGUE.len())
        }

        proptest! {
            #[test]
            fn test_only_uncatalogued_tokens_are_unknown(tokens in catalogued_tokens(), extra in "x_[a-z]{3,10}") {
                let mut set: PermissionSet = tokens.iter().copied().collect();
                prop_assert!(set.unknown_tokens().is_empty());

                set.insert(extra.clone());
                prop_assert_eq!(set.unknown_tokens(), vec![extra.as_str()]);
            }

            #[test]
            fn test_grants_matches_membership(tokens in catalogued_tokens()) {
                let set: PermissionSet = tokens.iter().copied().collect();
                for info in CATALOGUE {
                    prop_assert_eq!(set.grants(info.token), set.is_unrestricted() || tokens.contains(&info.token));
                }
            }
        }
    }
}
