//! Permission resolution properties
//!
//! - Role lookup by display name returns exactly the role's permissions
//! - A synchronization pass leaves every user with their role's permissions
//! - `all` grants every permission, and nothing else does

use proptest::prelude::*;
use shared::models::RoleDefinition;
use shared::permissions::{
    has_permission, plan_permission_sync, sync_user_permissions_with_roles, PermissionSet,
    RoleTable, UserPermissions, ALL, CATALOGUE,
};
use uuid::Uuid;

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Any assignable token except `all`
fn permission_strategy() -> impl Strategy<Value = String> {
    let tokens: Vec<String> = CATALOGUE
        .iter()
        .map(|p| p.token.to_string())
        .filter(|t| t != ALL)
        .collect();
    prop::sample::select(tokens)
}

fn permission_set_strategy() -> impl Strategy<Value = PermissionSet> {
    prop::collection::vec(permission_strategy(), 0..8).prop_map(|tokens| tokens.into_iter().collect())
}

/// Role tables with distinct keys and display names
fn role_table_strategy() -> impl Strategy<Value = RoleTable> {
    prop::collection::vec(permission_set_strategy(), 1..6).prop_map(|sets| {
        let roles = sets
            .into_iter()
            .enumerate()
            .map(|(i, permissions)| RoleDefinition {
                key: format!("role_{}", i),
                name: format!("دور {}", i),
                description: None,
                permissions,
                is_system: false,
            })
            .collect();
        RoleTable::new(roles)
    })
}

/// Users whose role may or may not exist and whose cached permissions are arbitrary
fn users_strategy() -> impl Strategy<Value = Vec<UserPermissions>> {
    prop::collection::vec((0usize..8, permission_set_strategy()), 0..12).prop_map(|users| {
        users
            .into_iter()
            .map(|(role, permissions)| UserPermissions {
                user_id: Uuid::new_v4(),
                role: format!("role_{}", role),
                permissions,
            })
            .collect()
    })
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Lookup by display name returns the stored set, empty for unknown names
    #[test]
    fn test_role_name_lookup_matches_role(table in role_table_strategy(), unknown in "[a-z]{3,12}") {
        for role in table.roles() {
            prop_assert_eq!(table.get_permissions_by_role_name(&role.name), role.permissions.clone());
        }
        prop_assert!(table.get_permissions_by_role_name(&unknown).is_empty());
    }

    /// After a sync pass every user holds their role's permissions
    #[test]
    fn test_sync_aligns_users_with_roles(table in role_table_strategy(), users in users_strategy()) {
        let mut synced = users.clone();
        let report = sync_user_permissions_with_roles(&mut synced, &table);

        prop_assert_eq!(report.checked, users.len());
        for user in &synced {
            prop_assert_eq!(&user.permissions, &table.get_permissions_by_role_key(&user.role));
        }

        let planned = plan_permission_sync(&users, &table);
        prop_assert_eq!(planned.len(), report.updated);

        // A second pass has nothing left to do
        prop_assert!(plan_permission_sync(&synced, &table).is_empty());
    }

    /// `all` grants any token; without it only listed tokens are granted
    #[test]
    fn test_all_grants_everything(set in permission_set_strategy(), probe in permission_strategy()) {
        let mut with_all = set.clone();
        with_all.insert(ALL);
        prop_assert!(has_permission(&with_all, &probe));

        prop_assert_eq!(has_permission(&set, &probe), set.contains(&probe));
    }
}

#[test]
fn test_empty_set_grants_nothing() {
    let empty = PermissionSet::new();
    for info in CATALOGUE {
        assert!(!has_permission(&empty, info.token));
    }
}
