use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use auth_cell::services::normalize_email;
use security_cell::{PasswordSecurityService, ValidationService};
use shared_config::AppConfig;
use shared_database::filters;
use shared_database::supabase::{is_unique_violation, SupabaseClient};
use shared_models::auth::Role;
use shared_models::response::{PageRequest, Pagination};
use shared_utils::export::{Sheet, MAX_EXPORT_ROWS};

use crate::models::{CreateUserRequest, UpdateUserRequest, UserAccount, UserError, UserListQuery};

const SEARCH_COLUMNS: &[&str] = &["name", "email"];

/// Every column except the password hash.
const EXPORT_SELECT: &str =
    "select=id,email,name,role,department,phone,is_active,last_login_at,created_at,updated_at";

const EXPORT_HEADERS: &[&str] = &[
    "Name",
    "Email",
    "Role",
    "Department",
    "Phone",
    "Active",
    "Last Login",
    "Created At",
];

/// Staff account administration.
pub struct UserService {
    supabase: SupabaseClient,
}

impl UserService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_users(&self, query: UserListQuery) -> Result<(Vec<UserAccount>, Pagination), UserError> {
        let page = PageRequest::new(query.page, query.limit);

        let mut fragments = Vec::new();
        if let Some(role) = query.role {
            fragments.push(filters::eq("role", role));
        }
        if let Some(search) = query
            .search
            .as_deref()
            .and_then(|term| filters::ilike_any(SEARCH_COLUMNS, term))
        {
            fragments.push(search);
        }
        fragments.push("order=created_at.desc".to_string());
        fragments.push(format!("limit={}", page.limit));
        fragments.push(format!("offset={}", page.offset()));

        let path = format!("/rest/v1/users?{}", filters::join(fragments));
        let (users, total) = self.supabase.request_with_count::<UserAccount>(&path).await?;

        Ok((users, Pagination::new(page, total)))
    }

    pub async fn export_users(&self, query: UserListQuery) -> Result<Sheet, UserError> {
        let mut fragments = vec![EXPORT_SELECT.to_string()];
        if let Some(role) = query.role {
            fragments.push(filters::eq("role", role));
        }
        if let Some(search) = query
            .search
            .as_deref()
            .and_then(|term| filters::ilike_any(SEARCH_COLUMNS, term))
        {
            fragments.push(search);
        }
        fragments.push("order=name.asc".to_string());
        fragments.push(format!("limit={}", MAX_EXPORT_ROWS));

        let path = format!("/rest/v1/users?{}", filters::join(fragments));
        let users: Vec<UserAccount> = self.supabase.select(&path).await?;

        let mut sheet = Sheet::new("Users", EXPORT_HEADERS);
        for user in users {
            sheet.push_row(vec![
                user.name.into(),
                user.email.into(),
                user.role.as_str().into(),
                user.department.into(),
                user.phone.into(),
                if user.is_active { "Yes" } else { "No" }.into(),
                user.last_login_at.into(),
                user.created_at.into(),
            ]);
        }

        Ok(sheet)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserAccount, UserError> {
        let path = format!("/rest/v1/users?id=eq.{}", id);

        self.supabase
            .select_one(&path)
            .await?
            .ok_or(UserError::NotFound)
    }

    #[instrument(skip(self, request), fields(email = %request.email, role = %request.role))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserAccount, UserError> {
        ValidationService::require(&[
            ("email", request.email.as_str()),
            ("password", request.password.as_str()),
            ("name", request.name.as_str()),
        ])
        .map_err(UserError::ValidationError)?;

        let email = checked_email(&request.email)?;
        check_phone(request.phone.as_deref())?;
        let hash = hash_new_password(&request.password)?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "email": email,
            "password": hash,
            "name": request.name.trim(),
            "role": request.role,
            "department": request.department,
            "phone": request.phone,
            "is_active": request.is_active.unwrap_or(true),
            "created_at": now,
            "updated_at": now
        });

        let account: UserAccount = self
            .supabase
            .insert("users", row)
            .await
            .map_err(|e| email_taken_or(e, &email))?;

        info!("Created {} account {}", account.role, account.id);
        Ok(account)
    }

    /// `actor` is the administrator making the change; they may not lock
    /// themselves out.
    #[instrument(skip(self, request))]
    pub async fn update_user(
        &self,
        actor: Uuid,
        id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserAccount, UserError> {
        if actor == id
            && (request.is_active == Some(false) || request.role.is_some_and(|r| r != Role::Admin))
        {
            return Err(UserError::SelfLockout);
        }

        let mut changes = Map::new();
        let mut email = String::new();

        if let Some(value) = request.email.as_deref() {
            email = checked_email(value)?;
            changes.insert("email".to_string(), json!(email));
        }
        if let Some(password) = request.password.as_deref().filter(|p| !p.is_empty()) {
            changes.insert("password".to_string(), json!(hash_new_password(password)?));
        }
        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(UserError::ValidationError("name is required".to_string()));
            }
            changes.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(role) = request.role {
            changes.insert("role".to_string(), json!(role));
        }
        if let Some(department) = request.department {
            changes.insert("department".to_string(), json!(department));
        }
        if let Some(phone) = request.phone {
            check_phone(Some(&phone))?;
            changes.insert("phone".to_string(), json!(phone));
        }
        if let Some(is_active) = request.is_active {
            changes.insert("is_active".to_string(), json!(is_active));
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/users?id=eq.{}", id);
        self.supabase
            .update(&path, Value::Object(changes))
            .await
            .map_err(|e| email_taken_or(e, &email))?
            .ok_or(UserError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, actor: Uuid, id: Uuid) -> Result<(), UserError> {
        if actor == id {
            return Err(UserError::SelfDeletion);
        }

        let path = format!("/rest/v1/users?id=eq.{}", id);
        if self.supabase.delete(&path).await? == 0 {
            return Err(UserError::NotFound);
        }

        info!("Deleted user {}", id);
        Ok(())
    }
}

fn checked_email(email: &str) -> Result<String, UserError> {
    let email = normalize_email(email);
    if !ValidationService::validate_email(&email) {
        return Err(UserError::ValidationError("Invalid email format".to_string()));
    }
    Ok(email)
}

fn check_phone(phone: Option<&str>) -> Result<(), UserError> {
    match phone.filter(|p| !p.trim().is_empty()) {
        Some(p) if !ValidationService::validate_phone(p) => {
            Err(UserError::ValidationError("Invalid phone number".to_string()))
        }
        _ => Ok(()),
    }
}

fn hash_new_password(password: &str) -> Result<String, UserError> {
    let strength = PasswordSecurityService::validate_password_strength(password);
    if !strength.is_acceptable() {
        return Err(UserError::ValidationError(strength.issues.join("; ")));
    }

    PasswordSecurityService::hash_password(password).map_err(|e| UserError::Hashing(e.to_string()))
}

fn email_taken_or(err: anyhow::Error, email: &str) -> UserError {
    if is_unique_violation(&err) {
        UserError::EmailTaken(email.to_string())
    } else {
        UserError::DatabaseError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_email_is_normalized_and_checked() {
        assert_eq!(checked_email("  Dr.Ana@Hospital.TEST ").unwrap(), "dr.ana@hospital.test");
        assert_matches!(checked_email("not-an-email"), Err(UserError::ValidationError(_)));
    }

    #[test]
    fn test_blank_phone_is_allowed() {
        assert!(check_phone(None).is_ok());
        assert!(check_phone(Some("  ")).is_ok());
        assert_matches!(check_phone(Some("call me")), Err(UserError::ValidationError(_)));
    }

    #[test]
    fn test_weak_password_is_not_hashed() {
        assert_matches!(hash_new_password("short"), Err(UserError::ValidationError(_)));
    }
}
