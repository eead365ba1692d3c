//! WebAssembly module for the security incident dashboard
//!
//! Gives the browser client the same permission logic the server runs:
//! - Permission checks and role resolution
//! - Route guard decisions
//! - An explicit session container

use shared::guard;
use shared::permissions::{self, PermissionSet, RoleTable, UserPermissions};
use shared::session::{SessionStore, SessionUser};
use shared::RoleDefinition;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("incident-dashboard wasm loaded"));
}

/// Every assignable permission token, in catalogue order
#[wasm_bindgen]
pub fn permission_catalogue() -> js_sys::Array {
    permissions::CATALOGUE
        .iter()
        .map(|p| JsValue::from_str(p.token))
        .collect()
}

fn parse<T: serde::de::DeserializeOwned>(json: &str, what: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid {} JSON: {}", what, e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Check a permission array (JSON) for a required token
#[wasm_bindgen]
pub fn has_permission(permissions_json: &str, required: &str) -> Result<bool, JsValue> {
    let permissions: PermissionSet = parse(permissions_json, "permissions")?;
    Ok(permissions::has_permission(&permissions, required))
}

/// Resolve a role key against a role list (JSON), returning a permission array
#[wasm_bindgen]
pub fn permissions_for_role(roles_json: &str, role_key: &str) -> Result<String, JsValue> {
    let roles: Vec<RoleDefinition> = parse(roles_json, "roles")?;
    let table = RoleTable::new(roles);
    to_json(&table.get_permissions_by_role_key(role_key))
}

/// Recompute cached permissions for a user list (JSON) against a role list
#[wasm_bindgen]
pub fn sync_permissions(users_json: &str, roles_json: &str) -> Result<String, JsValue> {
    let mut users: Vec<UserPermissions> = parse(users_json, "users")?;
    let roles: Vec<RoleDefinition> = parse(roles_json, "roles")?;
    permissions::sync_user_permissions_with_roles(&mut users, &RoleTable::new(roles));
    to_json(&users)
}

/// Private route decision for an optional session user (JSON or empty string)
#[wasm_bindgen]
pub fn evaluate_private_route(user_json: &str) -> Result<String, JsValue> {
    let user = parse_optional_user(user_json)?;
    to_json(&guard::private_route(user.as_ref()))
}

/// Permission route decision for an optional session user
#[wasm_bindgen]
pub fn evaluate_permission_route(user_json: &str, required: &str) -> Result<String, JsValue> {
    let user = parse_optional_user(user_json)?;
    to_json(&guard::permission_route(user.as_ref(), required))
}

fn parse_optional_user(user_json: &str) -> Result<Option<SessionUser>, JsValue> {
    if user_json.trim().is_empty() {
        return Ok(None);
    }
    parse(user_json, "user")
}

/// Session container owned by the client application
#[wasm_bindgen]
#[derive(Default)]
pub struct ClientSession {
    store: SessionStore,
}

#[wasm_bindgen]
impl ClientSession {
    #[wasm_bindgen(constructor)]
    pub fn new() -> ClientSession {
        ClientSession::default()
    }

    pub fn login(&mut self, user_json: &str, token: String) -> Result<(), JsValue> {
        let user: SessionUser = parse(user_json, "user")?;
        self.store.login(user, token);
        Ok(())
    }

    pub fn logout(&mut self) {
        self.store.logout();
    }

    pub fn reset(&mut self) {
        self.store.reset();
    }

    #[wasm_bindgen(getter)]
    pub fn authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn token(&self) -> Option<String> {
        self.store.token().map(str::to_string)
    }

    pub fn has_permission(&self, required: &str) -> bool {
        self.store.has_permission(required)
    }

    /// Refresh the signed-in user's permissions from a role list (JSON)
    pub fn apply_roles(&mut self, roles_json: &str) -> Result<(), JsValue> {
        let roles: Vec<RoleDefinition> = parse(roles_json, "roles")?;
        self.store.apply_roles(&RoleTable::new(roles));
        Ok(())
    }

    /// Guard decision for a route requiring `required`, or any signed-in user
    /// when `required` is empty
    pub fn guard(&self, required: &str) -> Result<String, JsValue> {
        let user = self.store.current_user();
        let outcome = if required.is_empty() {
            guard::private_route(user)
        } else {
            guard::permission_route(user, required)
        };
        to_json(&outcome)
    }
}
