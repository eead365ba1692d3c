//! Client-side session state
//!
//! Holds the authenticated user for the browser client. The store is created
//! once at application start and reset between tests.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::{HasPermissions, PermissionSet, RoleTable};

/// The signed-in user as the client sees it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    /// Role key
    pub role: String,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl HasPermissions for SessionUser {
    fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    user: Option<SessionUser>,
    token: Option<String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(&mut self, user: SessionUser, token: String) {
        self.user = Some(user);
        self.token = Some(token);
    }

    pub fn logout(&mut self) {
        self.user = None;
        self.token = None;
    }

    /// Return to the initial state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn current_user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn has_permission(&self, required: &str) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| crate::permissions::has_permission(u, required))
    }

    /// Re-derive the signed-in user's permissions after roles changed
    pub fn apply_roles(&mut self, table: &RoleTable) {
        if let Some(user) = self.user.as_mut() {
            user.permissions = table.get_permissions_by_role_key(&user.role);
            if let Some(role) = table.get_by_key(&user.role) {
                user.role_name = Some(role.name.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_roles;
    use crate::permissions::{MANAGE_USERS, VIEW_INCIDENTS};

    fn operator() -> SessionUser {
        SessionUser {
            id: Uuid::new_v4(),
            username: "op1".to_string(),
            name: "Operator".to_string(),
            email: "op1@example.com".to_string(),
            role: "camera_operator".to_string(),
            role_name: None,
            permissions: [VIEW_INCIDENTS].into_iter().collect(),
        }
    }

    #[test]
    fn test_login_logout() {
        let mut store = SessionStore::new();
        assert!(!store.is_authenticated());

        store.login(operator(), "token-1".to_string());
        assert!(store.is_authenticated());
        assert_eq!(store.token(), Some("token-1"));
        assert!(store.has_permission(VIEW_INCIDENTS));
        assert!(!store.has_permission(MANAGE_USERS));

        store.logout();
        assert!(store.current_user().is_none());
        assert!(store.token().is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = SessionStore::new();
        store.login(operator(), "t".to_string());
        store.reset();
        assert!(!store.is_authenticated());
        assert!(!store.has_permission(VIEW_INCIDENTS));
    }

    #[test]
    fn test_apply_roles_refreshes_permissions() {
        let table = RoleTable::new(default_roles());
        let mut store = SessionStore::new();
        let mut user = operator();
        user.role = "admin".to_string();
        store.login(user, "t".to_string());

        store.apply_roles(&table);

        let current = store.current_user().unwrap();
        assert!(current.permissions.is_unrestricted());
        assert_eq!(current.role_name.as_deref(), Some("أدمن"));
        assert!(store.has_permission(MANAGE_USERS));
    }
}
