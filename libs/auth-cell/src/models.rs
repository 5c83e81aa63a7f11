use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

/// Row of the `users` table. Reads snake_case columns, writes camelCase JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    /// Argon2 hash. Never leaves the service.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub name: String,
    pub role: Role,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn principal(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserAccount,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedToken {
    pub access_token: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    AccountInactive,

    #[error("Email {0} is already registered")]
    EmailTaken(String),

    #[error("Only patients can self-register")]
    RoleNotAllowed,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidToken(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::InvalidToken(_) => AppError::Auth(err.to_string()),
            AuthError::EmailTaken(_) => AppError::Conflict(err.to_string()),
            AuthError::RoleNotAllowed => AppError::Forbidden(err.to_string()),
            AuthError::Validation(msg) => AppError::ValidationError(msg),
            AuthError::UserNotFound => AppError::NotFound(err.to_string()),
            AuthError::Signing(msg) => AppError::Internal(msg),
            AuthError::Database(msg) => AppError::Database(msg),
        }
    }
}
