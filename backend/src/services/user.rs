//! User management service
//!
//! A user's `permissions` column is a cached copy of their role's permissions.
//! Every write that sets `role_key` also rewrites `permissions` in the same
//! transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{duplicate_entry, is_foreign_key_violation, AppError, AppResult};
use crate::services::RoleService;
use shared::models::UserStatus;
use shared::permissions::{HasPermissions, PermissionSet};
use shared::validation::{phone_rule, username_rule};

/// User management service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

/// A user account as returned by the API
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    /// Role key
    pub role: String,
    /// Display label of the role, resolved at read time
    pub role_name: Option<String>,
    pub department: Option<String>,
    pub phone_number: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: UserStatus,
    #[sqlx(try_from = "Vec<String>")]
    pub permissions: PermissionSet,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HasPermissions for User {
    fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }
}

pub(crate) const USER_COLUMNS: &str = r#"
    u.id, u.username, u.name, u.email, u.role_key AS role, r.name AS role_name,
    u.department, u.phone_number, u.status, u.permissions, u.last_login_at,
    u.created_at, u.updated_at
"#;

/// Query parameters for listing users
#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<String>,
    pub status: Option<UserStatus>,
    pub department: Option<String>,
}

/// Input for creating a user from the admin panel
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(custom = "username_rule")]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    /// Role key; defaults to the self-registration role
    pub role: Option<String>,
    pub department: Option<String>,
    #[validate(custom = "phone_rule")]
    pub phone_number: Option<String>,
    pub status: Option<UserStatus>,
}

/// Allow-listed user updates
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 100, message = "Name must not be empty"))]
    pub name: Option<String>,
    pub department: Option<String>,
    #[validate(custom = "phone_rule")]
    pub phone_number: Option<String>,
    pub status: Option<UserStatus>,
    /// Role key
    pub role: Option<String>,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List users, newest first
    pub async fn list(&self, filter: &UserFilter) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users u
            LEFT JOIN roles r ON r.key = u.role_key
            WHERE ($1::text IS NULL OR u.role_key = $1)
              AND ($2::text IS NULL OR u.status = $2)
              AND ($3::text IS NULL OR u.department = $3)
            ORDER BY u.created_at DESC
            "#
        ))
        .bind(filter.role.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.department.as_deref())
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    pub async fn get(&self, user_id: Uuid) -> AppResult<User> {
        let mut conn = self.db.acquire().await?;
        Self::fetch(&mut conn, user_id).await
    }

    pub(crate) async fn fetch(conn: &mut PgConnection, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users u
            LEFT JOIN roles r ON r.key = u.role_key
            WHERE u.id = $1
            "#
        ))
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Fail with a duplicate-entry error if the email or username is taken
    pub(crate) async fn ensure_unique(
        conn: &mut PgConnection,
        email: &str,
        username: &str,
    ) -> AppResult<()> {
        let email_taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_one(&mut *conn)
        .await?;
        if email_taken > 0 {
            return Err(AppError::DuplicateEntry("email".to_string()));
        }

        let username_taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE LOWER(username) = LOWER($1)",
        )
        .bind(username)
        .fetch_one(&mut *conn)
        .await?;
        if username_taken > 0 {
            return Err(AppError::DuplicateEntry("username".to_string()));
        }

        Ok(())
    }

    /// Insert a user whose permissions are copied from `role_key`
    pub(crate) async fn insert(
        conn: &mut PgConnection,
        input: &CreateUserInput,
        role_key: &str,
        password_hash: &str,
    ) -> AppResult<Uuid> {
        let table = RoleService::load_role_table(&mut *conn).await?;
        let role = table.get_by_key(role_key).ok_or_else(|| {
            AppError::validation("role", "Unknown role", "الدور غير موجود")
        })?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (username, name, email, password_hash, role_key, department,
                               phone_number, status, permissions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&input.username)
        .bind(&input.name)
        .bind(input.email.to_lowercase())
        .bind(password_hash)
        .bind(&role.key)
        .bind(&input.department)
        .bind(&input.phone_number)
        .bind(input.status.unwrap_or_default().as_str())
        .bind(role.permissions.to_vec())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| duplicate_entry(e, &["email", "username"]))?;

        Ok(user_id)
    }

    /// Create a user with an explicit role
    pub async fn create(&self, input: CreateUserInput) -> AppResult<User> {
        let password_hash = bcrypt::hash(&input.password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
        let role_key = input
            .role
            .clone()
            .unwrap_or_else(|| shared::models::DEFAULT_ROLE.to_string());

        let mut tx = self.db.begin().await?;
        Self::ensure_unique(&mut tx, &input.email, &input.username).await?;
        let user_id = Self::insert(&mut tx, &input, &role_key, &password_hash).await?;
        let user = Self::fetch(&mut tx, user_id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// Apply allow-listed changes; a role change re-derives permissions
    pub async fn update(&self, user_id: Uuid, input: UpdateUserInput) -> AppResult<User> {
        let mut tx = self.db.begin().await?;

        // Ensure the user exists before touching anything
        Self::fetch(&mut tx, user_id).await?;

        sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                department = COALESCE($3, department),
                phone_number = COALESCE($4, phone_number),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.department)
        .bind(&input.phone_number)
        .bind(input.status.map(|s| s.as_str()))
        .execute(&mut *tx)
        .await?;

        if let Some(role_key) = input.role.as_deref() {
            let table = RoleService::load_role_table(&mut tx).await?;
            let role = table.get_by_key(role_key).ok_or_else(|| {
                AppError::validation("role", "Unknown role", "الدور غير موجود")
            })?;

            sqlx::query(
                "UPDATE users SET role_key = $2, permissions = $3, updated_at = NOW() WHERE id = $1",
            )
            .bind(user_id)
            .bind(&role.key)
            .bind(role.permissions.to_vec())
            .execute(&mut *tx)
            .await?;

            tracing::info!(user_id = %user_id, role = %role.key, "User role changed");
        }

        let user = Self::fetch(&mut tx, user_id).await?;
        tx.commit().await?;

        Ok(user)
    }

    /// Delete a user; nobody can delete their own account
    pub async fn delete(&self, user_id: Uuid, acting_user_id: Uuid) -> AppResult<()> {
        if user_id == acting_user_id {
            return Err(AppError::conflict(
                "user",
                "You cannot delete your own account",
                "لا يمكنك حذف حسابك",
            ));
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::conflict(
                        "user",
                        "User still owns records; deactivate the account instead",
                        "المستخدم مرتبط بسجلات، قم بتعطيل الحساب بدلاً من حذفه",
                    )
                } else {
                    AppError::from(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }

        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }
}
