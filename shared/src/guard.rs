//! Route guards for the dashboard client
//!
//! Pure functions of session state: no network calls, no suspension.

use serde::Serialize;

use crate::permissions::has_permission;
use crate::session::SessionUser;

pub const LOGIN_PATH: &str = "/login";

/// Whether a session user is present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

impl SessionState {
    pub fn of(user: Option<&SessionUser>) -> Self {
        match user {
            Some(_) => SessionState::Authenticated,
            None => SessionState::Anonymous,
        }
    }
}

/// The only action offered on the not-authorized panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelAction {
    GoBack,
}

/// In-place panel shown instead of a protected page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotAuthorizedPanel {
    pub title_ar: &'static str,
    pub title_en: &'static str,
    pub message_ar: &'static str,
    pub message_en: &'static str,
    pub required_permission: String,
    pub action: PanelAction,
    pub action_label_ar: &'static str,
}

impl NotAuthorizedPanel {
    fn for_permission(required: &str) -> Self {
        Self {
            title_ar: "غير مصرح",
            title_en: "Not authorized",
            message_ar: "ليس لديك صلاحية للوصول إلى هذه الصفحة",
            message_en: "You do not have permission to view this page",
            required_permission: required.to_string(),
            action: PanelAction::GoBack,
            action_label_ar: "رجوع",
        }
    }
}

/// What the router should do for a guarded route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GuardOutcome {
    Render,
    Redirect { to: String },
    NotAuthorized { panel: NotAuthorizedPanel },
}

/// Anonymous users are sent to the login page
pub fn private_route(user: Option<&SessionUser>) -> GuardOutcome {
    match SessionState::of(user) {
        SessionState::Authenticated => GuardOutcome::Render,
        SessionState::Anonymous => GuardOutcome::Redirect {
            to: LOGIN_PATH.to_string(),
        },
    }
}

/// Authenticated users without `required` see the not-authorized panel in
/// place. Anonymous users are treated as by [`private_route`].
pub fn permission_route(user: Option<&SessionUser>, required: &str) -> GuardOutcome {
    match user {
        None => private_route(None),
        Some(u) if has_permission(u, required) => GuardOutcome::Render,
        Some(_) => GuardOutcome::NotAuthorized {
            panel: NotAuthorizedPanel::for_permission(required),
        },
    }
}
