use serde::Deserialize;

use shared_database::supabase::into_app_error;
use shared_models::auth::Role;
use shared_models::error::AppError;

pub use auth_cell::models::UserAccount;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

/// Every field optional; `password` replaces the stored hash when present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub role: Option<Role>,
    pub search: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Email {0} is already registered")]
    EmailTaken(String),

    #[error("You cannot delete your own account")]
    SelfDeletion,

    #[error("You cannot deactivate or demote your own account")]
    SelfLockout,

    #[error("{0}")]
    ValidationError(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AppError::NotFound(err.to_string()),
            UserError::EmailTaken(_) => AppError::Conflict(err.to_string()),
            UserError::SelfDeletion | UserError::SelfLockout => AppError::BadRequest(err.to_string()),
            UserError::ValidationError(msg) => AppError::ValidationError(msg),
            UserError::Hashing(msg) => AppError::Internal(msg),
            UserError::DatabaseError(e) => into_app_error(e),
        }
    }
}
