//! Error handling for the security incident dashboard
//!
//! Provides consistent error responses in Arabic and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        message_ar: String,
    },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_ar: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_ar: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Report generation failed: {0}")]
    ReportGeneration(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(
        field: &str,
        message: impl Into<String>,
        message_ar: impl Into<String>,
    ) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
            message_ar: message_ar.into(),
        }
    }

    pub fn conflict(
        resource: &str,
        message: impl Into<String>,
        message_ar: impl Into<String>,
    ) -> Self {
        AppError::Conflict {
            resource: resource.to_string(),
            message: message.into(),
            message_ar: message_ar.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::InvalidToken
            | AppError::AccountInactive
            | AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_) | AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::StorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ReportGeneration(_)
            | AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to persist or show to clients; database and internal
    /// failures collapse to their generic message.
    pub fn public_message(&self) -> String {
        match self {
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                self.detail().message_en
            }
            _ => self.to_string(),
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            AppError::InvalidCredentials => ErrorDetail::new(
                "INVALID_CREDENTIALS",
                "Invalid email or password",
                "البريد الإلكتروني أو كلمة المرور غير صحيحة",
            ),
            AppError::TokenExpired => ErrorDetail::new(
                "TOKEN_EXPIRED",
                "Token has expired",
                "انتهت صلاحية الرمز",
            ),
            AppError::InvalidToken => ErrorDetail::new(
                "INVALID_TOKEN",
                "Invalid token",
                "الرمز غير صالح",
            ),
            AppError::AccountInactive => ErrorDetail::new(
                "ACCOUNT_INACTIVE",
                "This account is inactive",
                "هذا الحساب غير نشط",
            ),
            AppError::InsufficientPermissions => ErrorDetail::new(
                "INSUFFICIENT_PERMISSIONS",
                "You do not have permission to perform this action",
                "ليس لديك صلاحية لتنفيذ هذا الإجراء",
            ),
            AppError::Unauthorized { message, message_ar } => {
                ErrorDetail::new("UNAUTHORIZED", message, message_ar)
            }
            AppError::Validation {
                field,
                message,
                message_ar,
            } => ErrorDetail::new("VALIDATION_ERROR", message, message_ar).with_field(field),
            AppError::ValidationError(msg) => ErrorDetail::new(
                "VALIDATION_ERROR",
                msg,
                &format!("البيانات غير صحيحة: {}", msg),
            ),
            AppError::DuplicateEntry(field) => ErrorDetail::new(
                "DUPLICATE_ENTRY",
                &format!("A record with this {} already exists", field),
                &format!("يوجد سجل بنفس {} مسبقاً", field),
            )
            .with_field(field),
            AppError::Conflict {
                resource,
                message,
                message_ar,
            } => ErrorDetail::new("CONFLICT", message, message_ar).with_field(resource),
            AppError::NotFound(resource) => ErrorDetail::new(
                "NOT_FOUND",
                &format!("{} not found", resource),
                &format!("لم يتم العثور على {}", resource),
            ),
            AppError::InvalidStateTransition(msg) => ErrorDetail::new(
                "INVALID_STATE_TRANSITION",
                msg,
                &format!("لا يمكن تغيير الحالة: {}", msg),
            ),
            AppError::ReportGeneration(_) => ErrorDetail::new(
                "REPORT_GENERATION_ERROR",
                "The report could not be generated",
                "تعذر إنشاء التقرير",
            ),
            AppError::StorageError(_) => ErrorDetail::new(
                "STORAGE_ERROR",
                "Report storage is unavailable",
                "تخزين التقارير غير متاح",
            ),
            AppError::Configuration(msg) => ErrorDetail::new(
                "CONFIGURATION_ERROR",
                &format!("Configuration error: {}", msg),
                "خطأ في الإعدادات",
            ),
            AppError::DatabaseError(_) => ErrorDetail::new(
                "DATABASE_ERROR",
                "A database error occurred",
                "حدث خطأ في قاعدة البيانات",
            ),
            AppError::Internal(_) | AppError::InternalError(_) => ErrorDetail::new(
                "INTERNAL_ERROR",
                "An internal server error occurred",
                "حدث خطأ داخلي في الخادم",
            ),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        // Report the first failing field; the envelope carries a single field
        let first = errors
            .field_errors()
            .into_iter()
            .min_by_key(|(field, _)| *field)
            .and_then(|(field, errs)| errs.first().map(|e| (field, e.clone())));

        match first {
            Some((field, error)) => {
                let message = error
                    .message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                AppError::Validation {
                    field: field.to_string(),
                    message_ar: format!("قيمة غير صالحة للحقل {}", field),
                    message,
                }
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_ar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: &str, message_ar: &str) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.to_string(),
            message_ar: message_ar.to_string(),
            field: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: self.detail() })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

/// Postgres reports foreign key violations with SQLSTATE 23503
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == "23503")
}

/// Map a unique violation to `DuplicateEntry`.
///
/// The field is the first of `fields` named in the violated constraint,
/// `fields[0]` when none is. Other errors pass through unchanged.
pub fn duplicate_entry(err: sqlx::Error, fields: &[&str]) -> AppError {
    let constraint = err
        .as_database_error()
        .filter(|db| db.is_unique_violation())
        .map(|db| db.constraint().unwrap_or_default().to_string());
    let Some(constraint) = constraint else {
        return AppError::DatabaseError(err);
    };

    let field = fields
        .iter()
        .find(|field| constraint.contains(**field))
        .or(fields.first())
        .copied()
        .unwrap_or("value");
    AppError::DuplicateEntry(field.to_string())
}
