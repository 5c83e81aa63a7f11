use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use security_cell::{PasswordSecurityService, ValidationService};
use shared_config::AppConfig;
use shared_database::filters;
use shared_database::supabase::{is_unique_violation, SupabaseClient};
use shared_models::auth::{Role, TokenType};
use shared_utils::jwt::{issue_access_token, issue_token_pair, validate_token};

use crate::models::{
    AuthError, AuthSession, LoginRequest, RefreshedToken, RegisterRequest, UserAccount,
};

pub struct AuthService {
    supabase: SupabaseClient,
    config: AppConfig,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            config: config.clone(),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, AuthError> {
        let path = format!(
            "/rest/v1/users?{}&limit=1",
            filters::eq("email", normalize_email(email))
        );

        self.supabase
            .select_one(&path)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, AuthError> {
        let path = format!("/rest/v1/users?id=eq.{}&limit=1", id);

        self.supabase
            .select_one(&path)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, AuthError> {
        let account = self
            .find_by_email(&request.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = account.password.as_deref().ok_or(AuthError::InvalidCredentials)?;
        let matches = PasswordSecurityService::verify_password(&request.password, hash)
            .map_err(|e| {
                warn!("Stored password hash for {} is unreadable: {}", account.id, e);
                AuthError::InvalidCredentials
            })?;

        if !matches {
            debug!("Password mismatch for {}", account.id);
            return Err(AuthError::InvalidCredentials);
        }

        if !account.is_active {
            return Err(AuthError::AccountInactive);
        }

        self.touch_last_login(account.id).await;

        let tokens = issue_token_pair(&account.principal(), &self.config).map_err(AuthError::Signing)?;
        info!("User {} logged in as {}", account.id, account.role);

        Ok(AuthSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user: account,
        })
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, AuthError> {
        if request.role.is_some_and(|role| role != Role::Patient) {
            return Err(AuthError::RoleNotAllowed);
        }

        ValidationService::require(&[
            ("email", request.email.as_str()),
            ("password", request.password.as_str()),
            ("name", request.name.as_str()),
        ])
        .map_err(AuthError::Validation)?;

        let email = normalize_email(&request.email);
        if !ValidationService::validate_email(&email) {
            return Err(AuthError::Validation("Invalid email format".to_string()));
        }

        if let Some(phone) = request.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            if !ValidationService::validate_phone(phone) {
                return Err(AuthError::Validation("Invalid phone number".to_string()));
            }
        }

        let strength = PasswordSecurityService::validate_password_strength(&request.password);
        if !strength.is_acceptable() {
            return Err(AuthError::Validation(strength.issues.join("; ")));
        }

        let hash = PasswordSecurityService::hash_password(&request.password)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "email": email,
            "password": hash,
            "name": request.name.trim(),
            "role": Role::Patient,
            "phone": request.phone,
            "is_active": true,
            "created_at": now,
            "updated_at": now
        });

        let account: UserAccount = self.supabase.insert("users", row).await.map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::EmailTaken(email.clone())
            } else {
                AuthError::Database(e.to_string())
            }
        })?;

        let tokens = issue_token_pair(&account.principal(), &self.config).map_err(AuthError::Signing)?;
        info!("Registered patient account {}", account.id);

        Ok(AuthSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user: account,
        })
    }

    /// Exchanges a refresh token for a new access token. The role is re-read
    /// from storage so demotions take effect at the next refresh.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, AuthError> {
        let claimed = validate_token(refresh_token, &self.config.jwt_refresh_secret, TokenType::Refresh)
            .map_err(AuthError::InvalidToken)?;

        let account = self
            .find_by_id(claimed.id)
            .await?
            .ok_or_else(|| AuthError::InvalidToken("User no longer exists".to_string()))?;

        if !account.is_active {
            return Err(AuthError::AccountInactive);
        }

        let access_token =
            issue_access_token(&account.principal(), &self.config).map_err(AuthError::Signing)?;

        Ok(RefreshedToken { access_token })
    }

    pub async fn me(&self, id: Uuid) -> Result<UserAccount, AuthError> {
        self.find_by_id(id).await?.ok_or(AuthError::UserNotFound)
    }

    async fn touch_last_login(&self, id: Uuid) {
        let path = format!("/rest/v1/users?id=eq.{}", id);
        let changes = json!({ "last_login_at": Utc::now().to_rfc3339() });

        if let Err(e) = self.supabase.update::<Value>(&path, changes).await {
            warn!("Could not record last login for {}: {}", id, e);
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Dr.Hadi@Hospital.TEST "), "dr.hadi@hospital.test");
    }
}
