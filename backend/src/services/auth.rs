//! Authentication service for user registration, login, and token management

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::user::{CreateUserInput, User, UserService};
use shared::models::{UserStatus, DEFAULT_ROLE};
use shared::permissions::PermissionSet;
use shared::validation::{phone_rule, username_rule};

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

/// Input for self-registration
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(custom = "username_rule")]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    pub department: Option<String>,
    #[validate(custom = "phone_rule")]
    pub phone_number: Option<String>,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub username: String,
    /// Role key
    pub role: String,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Tokens plus the signed-in user
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

/// Credentials row used during login
#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    id: Uuid,
    password_hash: String,
    #[sqlx(try_from = "String")]
    status: UserStatus,
}

/// Account state checked on every authenticated request
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    username: String,
    role_key: String,
    permissions: Vec<String>,
    #[sqlx(try_from = "String")]
    status: UserStatus,
}

/// Deleted and deactivated accounts lose access even with a live token
fn session_user(user_id: Uuid, row: Option<SessionRow>) -> AppResult<AuthUser> {
    let row = row.ok_or(AppError::InvalidToken)?;
    if !row.status.is_active() {
        return Err(AppError::AccountInactive);
    }

    Ok(AuthUser {
        user_id,
        username: row.username,
        role: row.role_key,
        permissions: PermissionSet::from(row.permissions),
    })
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            refresh_token_expiry: config.jwt.refresh_token_expiry,
        }
    }

    /// Register a new account with the default role
    pub async fn register(&self, input: RegisterInput) -> AppResult<AuthResponse> {
        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let account = CreateUserInput {
            username: input.username,
            email: input.email,
            password: input.password,
            name: input.name,
            role: None,
            department: input.department,
            phone_number: input.phone_number,
            status: None,
        };

        let mut tx = self.db.begin().await?;
        UserService::ensure_unique(&mut tx, &account.email, &account.username).await?;
        let user_id = UserService::insert(&mut tx, &account, DEFAULT_ROLE, &password_hash).await?;
        let user = UserService::fetch(&mut tx, user_id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        self.issue(user).await
    }

    /// Authenticate user with email and password
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthResponse> {
        let credentials = sqlx::query_as::<_, CredentialsRow>(
            "SELECT id, password_hash, status FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        let valid = verify(password, &credentials.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            tracing::debug!(user_id = %credentials.id, "Login rejected: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        if !credentials.status.is_active() {
            return Err(AppError::AccountInactive);
        }

        // Update last login
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(credentials.id)
            .execute(&self.db)
            .await?;

        let user = UserService::new(self.db.clone()).get(credentials.id).await?;
        self.issue(user).await
    }

    /// Rotate a refresh token into a new token pair
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let token_hash = Self::hash_token(refresh_token);

        // Revoke and look up in one statement so a token is only usable once
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE refresh_tokens rt
            SET revoked_at = NOW()
            FROM users u
            WHERE rt.token_hash = $1
              AND u.id = rt.user_id
              AND rt.expires_at > NOW()
              AND rt.revoked_at IS NULL
              AND u.status = 'active'
            RETURNING rt.user_id
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized {
            message: "Invalid or expired refresh token".to_string(),
            message_ar: "رمز التحديث غير صالح أو منتهي".to_string(),
        })?;

        let user = UserService::new(self.db.clone()).get(user_id).await?;
        self.issue(user).await
    }

    /// Current account state, with permissions as stored now
    pub async fn me(&self, user_id: Uuid) -> AppResult<User> {
        UserService::new(self.db.clone()).get(user_id).await
    }

    /// Resolve a bearer token to the account as it is stored now
    pub async fn authenticate(&self, token: &str) -> AppResult<AuthUser> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT username, role_key, permissions, status FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        session_user(user_id, row)
    }

    /// Validate access token and return claims
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })?;

        Ok(token_data.claims)
    }

    async fn issue(&self, user: User) -> AppResult<AuthResponse> {
        let token = self.generate_access_token(&user)?;

        // Refresh token (simple random token)
        let refresh_token = Uuid::new_v4().to_string();
        self.store_refresh_token(user.id, &refresh_token).await?;

        Ok(AuthResponse {
            token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
            user,
        })
    }

    /// Sign an access token carrying the user's current permissions
    fn generate_access_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let access_exp = now + Duration::seconds(self.access_token_expiry);

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.clone(),
            permissions: user.permissions.to_vec(),
            exp: access_exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Store refresh token in database
    async fn store_refresh_token(&self, user_id: Uuid, token: &str) -> AppResult<()> {
        let token_hash = Self::hash_token(token);
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Hash a token for storage
    fn hash_token(token: &str) -> String {
        format!("{:x}", Sha256::digest(token.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn service(access_token_expiry: i64) -> AuthService {
        let db = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/incident_dashboard_test")
            .unwrap();
        AuthService {
            db,
            jwt_secret: "test-secret".to_string(),
            access_token_expiry,
            refresh_token_expiry: 3600,
        }
    }

    fn operator() -> User {
        User {
            id: Uuid::new_v4(),
            username: "op1".to_string(),
            name: "Operator".to_string(),
            email: "op1@example.com".to_string(),
            role: "camera_operator".to_string(),
            role_name: Some("مشغل كاميرات".to_string()),
            department: None,
            phone_number: None,
            status: UserStatus::Active,
            permissions: PermissionSet::from(vec!["view_incidents".to_string()]),
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn session_row(status: UserStatus) -> SessionRow {
        SessionRow {
            username: "op1".to_string(),
            role_key: "shift_supervisor".to_string(),
            permissions: vec!["view_incidents".to_string(), "manage_incidents".to_string()],
            status,
        }
    }

    #[test]
    fn test_session_user_uses_stored_role_and_permissions() {
        let user_id = Uuid::new_v4();
        let user = session_user(user_id, Some(session_row(UserStatus::Active))).unwrap();

        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, "shift_supervisor");
        assert!(user.has_permission("manage_incidents"));
    }

    #[test]
    fn test_session_user_rejects_inactive_and_missing_accounts() {
        assert!(matches!(
            session_user(Uuid::new_v4(), Some(session_row(UserStatus::Inactive))),
            Err(AppError::AccountInactive)
        ));
        assert!(matches!(
            session_user(Uuid::new_v4(), None),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_hash_token_is_stable_sha256_hex() {
        let a = AuthService::hash_token("refresh-1");
        assert_eq!(a, AuthService::hash_token("refresh-1"));
        assert_ne!(a, AuthService::hash_token("refresh-2"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_access_token_round_trip() {
        let service = service(3600);
        let user = operator();

        let token = service.generate_access_token(&user).unwrap();
        let claims = service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, "camera_operator");
        assert_eq!(claims.permissions, vec!["view_incidents".to_string()]);
    }

    #[tokio::test]
    async fn test_expired_token_is_reported_as_expired() {
        // Well past the default 60 second leeway
        let service = service(-3600);
        let token = service.generate_access_token(&operator()).unwrap();

        assert!(matches!(
            service.validate_token(&token),
            Err(AppError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_invalid() {
        let token = service(3600).generate_access_token(&operator()).unwrap();
        let other = AuthService {
            jwt_secret: "another-secret".to_string(),
            ..service(3600)
        };

        assert!(matches!(other.validate_token(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_register_input_validation() {
        let input: RegisterInput = serde_json::from_str(
            r#"{"username":"bob123","email":"bob@x.com","password":"secret1","name":"Bob"}"#,
        )
        .unwrap();
        assert!(input.validate().is_ok());

        let input: RegisterInput = serde_json::from_str(
            r#"{"username":"b","email":"bob-at-x","password":"123","name":"Bob"}"#,
        )
        .unwrap();
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
