//! Role management service
//!
//! Roles are the single source of permissions. Any change to a role's
//! permission set re-synchronizes the cached permissions of its users in the
//! same transaction, so readers never see a user out of step with their role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{duplicate_entry, AppError, AppResult};
use shared::models::RoleDefinition;
use shared::permissions::{
    self, PermissionInfo, PermissionSet, RoleTable, SyncReport, UserPermissions,
};
use shared::validation::role_key_rule;

/// Role service for managing roles and their permissions
#[derive(Clone)]
pub struct RoleService {
    db: PgPool,
}

/// Role information
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(try_from = "Vec<String>")]
    pub permissions: PermissionSet,
    pub is_system: bool,
    pub user_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Role> for RoleDefinition {
    fn from(role: Role) -> Self {
        RoleDefinition {
            key: role.key,
            name: role.name,
            description: role.description,
            permissions: role.permissions,
            is_system: role.is_system,
        }
    }
}

const ROLE_COLUMNS: &str = r#"
    r.id, r.key, r.name, r.description, r.permissions, r.is_system,
    (SELECT COUNT(*) FROM users u WHERE u.role_key = r.key) AS user_count,
    r.created_at, r.updated_at
"#;

/// Input for creating a role
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleInput {
    #[validate(custom = "role_key_rule")]
    pub key: String,
    #[validate(length(min = 1, max = 60, message = "Role name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Input for updating a role
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateRoleInput {
    #[validate(length(min = 1, max = 60, message = "Role name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

/// Reject tokens outside the permission catalogue
fn checked_permissions(tokens: Vec<String>) -> AppResult<PermissionSet> {
    let set = PermissionSet::from(tokens);
    let unknown = set.unknown_tokens();
    if !unknown.is_empty() {
        return Err(AppError::Validation {
            field: "permissions".to_string(),
            message: format!("Unknown permissions: {}", unknown.join(", ")),
            message_ar: format!("صلاحيات غير معروفة: {}", unknown.join("، ")),
        });
    }
    Ok(set)
}

impl RoleService {
    /// Create a new RoleService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get all roles, system roles first
    pub async fn get_roles(&self) -> AppResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(&format!(
            r#"
            SELECT {ROLE_COLUMNS}
            FROM roles r
            ORDER BY r.is_system DESC, r.created_at ASC
            "#
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(roles)
    }

    pub async fn get_role(&self, role_id: Uuid) -> AppResult<Role> {
        let mut conn = self.db.acquire().await?;
        Self::fetch(&mut conn, role_id).await
    }

    async fn fetch(conn: &mut PgConnection, role_id: Uuid) -> AppResult<Role> {
        sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles r WHERE r.id = $1"
        ))
        .bind(role_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Role".to_string()))
    }

    /// Every assignable permission token with its labels
    pub fn get_all_permissions(&self) -> &'static [PermissionInfo] {
        permissions::CATALOGUE
    }

    /// Snapshot of every role, used for permission resolution
    pub async fn load_role_table(conn: &mut PgConnection) -> AppResult<RoleTable> {
        let roles = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles r ORDER BY r.created_at ASC"
        ))
        .fetch_all(&mut *conn)
        .await?;

        Ok(RoleTable::new(roles.into_iter().map(RoleDefinition::from).collect()))
    }

    /// Permissions of the role with this display name; empty when no such role
    pub async fn get_permissions_by_role_name(&self, role_name: &str) -> AppResult<PermissionSet> {
        let mut conn = self.db.acquire().await?;
        let table = Self::load_role_table(&mut conn).await?;
        Ok(table.get_permissions_by_role_name(role_name))
    }

    /// Create a role
    pub async fn create_role(&self, input: CreateRoleInput) -> AppResult<Role> {
        let permissions = checked_permissions(input.permissions)?;

        let mut tx = self.db.begin().await?;

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM roles WHERE key = $1 OR name = $2",
        )
        .bind(&input.key)
        .bind(&input.name)
        .fetch_one(&mut *tx)
        .await?;

        if existing > 0 {
            return Err(AppError::conflict(
                "role",
                "A role with this key or name already exists",
                "يوجد دور بنفس المعرف أو الاسم",
            ));
        }

        let role_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO roles (key, name, description, permissions, is_system)
            VALUES ($1, $2, $3, $4, false)
            RETURNING id
            "#,
        )
        .bind(&input.key)
        .bind(&input.name)
        .bind(&input.description)
        .bind(permissions.to_vec())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| duplicate_entry(e, &["name", "key"]))?;

        let role = Self::fetch(&mut tx, role_id).await?;
        tx.commit().await?;

        tracing::info!(role = %role.key, "Role created");
        Ok(role)
    }

    /// Update a role; system roles keep their name but may change permissions
    pub async fn update_role(&self, role_id: Uuid, input: UpdateRoleInput) -> AppResult<Role> {
        let permissions = input.permissions.map(checked_permissions).transpose()?;

        let mut tx = self.db.begin().await?;
        let existing = Self::fetch(&mut tx, role_id).await?;

        if let Some(name) = input.name.as_deref() {
            if existing.is_system && name != existing.name {
                return Err(AppError::validation(
                    "name",
                    "Cannot rename system roles",
                    "لا يمكن تغيير اسم أدوار النظام",
                ));
            }

            let duplicate = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM roles WHERE name = $1 AND id != $2",
            )
            .bind(name)
            .bind(role_id)
            .fetch_one(&mut *tx)
            .await?;

            if duplicate > 0 {
                return Err(AppError::conflict(
                    "role",
                    "Role with this name already exists",
                    "يوجد دور بهذا الاسم",
                ));
            }
        }

        sqlx::query(
            r#"
            UPDATE roles SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                permissions = COALESCE($4, permissions),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(role_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(permissions.as_ref().map(PermissionSet::to_vec))
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_entry(e, &["name"]))?;

        if permissions.is_some() {
            let report = Self::sync_in(&mut tx).await?;
            tracing::info!(
                role = %existing.key,
                users_updated = report.updated,
                "Role permissions changed"
            );
        }

        let role = Self::fetch(&mut tx, role_id).await?;
        tx.commit().await?;

        Ok(role)
    }

    /// Delete a role nobody references (system roles cannot be deleted)
    pub async fn delete_role(&self, role_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let role = Self::fetch(&mut tx, role_id).await?;

        if role.is_system {
            return Err(AppError::validation(
                "role_id",
                "Cannot delete system roles",
                "لا يمكن حذف أدوار النظام",
            ));
        }

        if role.user_count > 0 {
            return Err(AppError::Conflict {
                resource: "role".to_string(),
                message: format!(
                    "Cannot delete role: {} users are assigned to it",
                    role.user_count
                ),
                message_ar: format!(
                    "لا يمكن حذف الدور: يوجد {} مستخدم مرتبط به",
                    role.user_count
                ),
            });
        }

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(role = %role.key, "Role deleted");
        Ok(())
    }

    /// Recompute every user's cached permissions from their role
    pub async fn sync_user_permissions_with_roles(&self) -> AppResult<SyncReport> {
        let mut tx = self.db.begin().await?;
        let report = Self::sync_in(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(
            checked = report.checked,
            updated = report.updated,
            "User permissions synchronized"
        );
        Ok(report)
    }

    /// Sync pass on an open connection or transaction; only changed rows are written
    pub(crate) async fn sync_in(conn: &mut PgConnection) -> AppResult<SyncReport> {
        let table = Self::load_role_table(&mut *conn).await?;

        let users = sqlx::query_as::<_, (Uuid, String, Vec<String>)>(
            "SELECT id, role_key, permissions FROM users FOR UPDATE",
        )
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|(user_id, role, permissions)| UserPermissions {
            user_id,
            role,
            permissions: PermissionSet::from(permissions),
        })
        .collect::<Vec<_>>();

        let updates = permissions::plan_permission_sync(&users, &table);

        for update in &updates {
            sqlx::query("UPDATE users SET permissions = $2, updated_at = NOW() WHERE id = $1")
                .bind(update.user_id)
                .bind(update.permissions.to_vec())
                .execute(&mut *conn)
                .await?;
        }

        Ok(SyncReport {
            checked: users.len(),
            updated: updates.len(),
        })
    }
}
