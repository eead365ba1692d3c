//! Authentication middleware
//!
//! JWT authentication and permission checks for protected routes

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::AuthService;
use crate::AppState;
use shared::models::ADMIN_ROLE;
use shared::permissions::{self, HasPermissions, PermissionSet};

/// Authenticated user, resolved from the token and the stored account
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    /// Role key
    pub role: String,
    pub permissions: PermissionSet,
}

impl HasPermissions for AuthUser {
    fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, permission: &str) -> bool {
        permissions::has_permission(self, permission)
    }

    /// Fail with 403 unless the user has `permission`
    pub fn require(&self, permission: &str) -> AppResult<()> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.user_id, permission, "Permission denied");
            Err(AppError::InsufficientPermissions)
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE || self.permissions.is_unrestricted()
    }

    /// Owners and admins may change a record
    pub fn can_modify(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id || self.is_admin()
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return AppError::Unauthorized {
            message: "Missing or invalid Authorization header".to_string(),
            message_ar: "يجب تسجيل الدخول أولاً".to_string(),
        }
        .into_response();
    };

    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let auth_user = match auth_service.authenticate(bearer.token()).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication required".to_string(),
                message_ar: "يجب تسجيل الدخول أولاً".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::permissions::{MANAGE_USERS, VIEW_INCIDENTS};

    fn user(role: &str, permissions: &[&str]) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            username: "op1".to_string(),
            role: role.to_string(),
            permissions: permissions.iter().copied().collect(),
        }
    }

    #[test]
    fn test_require() {
        let operator = user("camera_operator", &[VIEW_INCIDENTS]);
        assert!(operator.require(VIEW_INCIDENTS).is_ok());
        assert!(matches!(
            operator.require(MANAGE_USERS),
            Err(AppError::InsufficientPermissions)
        ));
    }

    #[test]
    fn test_all_grants_every_permission() {
        let admin = user("admin", &["all"]);
        assert!(admin.has_permission(MANAGE_USERS));
        assert!(admin.is_admin());
    }

    #[test]
    fn test_can_modify() {
        let operator = user("camera_operator", &[VIEW_INCIDENTS]);
        assert!(operator.can_modify(operator.user_id));
        assert!(!operator.can_modify(Uuid::new_v4()));
        assert!(user("admin", &["all"]).can_modify(Uuid::new_v4()));
    }
}
