use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::error::AppError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// Failure reported by PostgREST, classified by SQLSTATE where possible.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violation: {message}")]
    UniqueViolation { message: String, details: String },

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Default, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

pub fn as_supabase_error(err: &anyhow::Error) -> Option<&SupabaseError> {
    err.downcast_ref::<SupabaseError>()
}

pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(as_supabase_error(err), Some(SupabaseError::UniqueViolation { .. }))
}

/// True when `err` is a unique violation whose constraint mentions `column`.
pub fn is_unique_violation_on(err: &anyhow::Error, column: &str) -> bool {
    match as_supabase_error(err) {
        Some(SupabaseError::UniqueViolation { message, details }) => {
            message.contains(column) || details.contains(column)
        }
        _ => false,
    }
}

pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    matches!(as_supabase_error(err), Some(SupabaseError::ForeignKeyViolation(_)))
}

/// Maps a persistence failure onto the HTTP error it should surface as.
/// Constraint violations are the caller's fault; anything else is ours.
pub fn into_app_error(err: anyhow::Error) -> AppError {
    match as_supabase_error(&err) {
        Some(SupabaseError::UniqueViolation { message, details }) => {
            let detail = if details.is_empty() { message } else { details };
            AppError::Conflict(format!("Duplicate value: {}", detail))
        }
        Some(SupabaseError::ForeignKeyViolation(message)) => {
            AppError::BadRequest(format!("Referenced record is missing or still in use: {}", message))
        }
        Some(SupabaseError::CheckViolation(message)) => AppError::ValidationError(message.clone()),
        Some(SupabaseError::NotFound(message)) => AppError::NotFound(message.clone()),
        _ => AppError::Database(err.to_string()),
    }
}

#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.service_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key))?,
        );

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            let parsed: PostgrestErrorBody = serde_json::from_str(&error_text).unwrap_or_default();
            let message = parsed.message.unwrap_or_else(|| error_text.clone());
            let details = parsed.details.unwrap_or_default();

            let classified = match parsed.code.as_deref() {
                Some(UNIQUE_VIOLATION) => SupabaseError::UniqueViolation { message, details },
                Some(FOREIGN_KEY_VIOLATION) => SupabaseError::ForeignKeyViolation(message),
                Some(CHECK_VIOLATION) => SupabaseError::CheckViolation(message),
                _ => match status.as_u16() {
                    401 | 403 => SupabaseError::Auth(message),
                    404 => SupabaseError::NotFound(message),
                    409 => SupabaseError::UniqueViolation { message, details },
                    code => SupabaseError::Api { status: code, message },
                },
            };

            return Err(anyhow::Error::new(classified));
        }

        Ok(response)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body, extra_headers).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// GET that also returns the total row count matching the filters,
    /// ignoring `limit`/`offset`.
    pub async fn request_with_count<T>(&self, path: &str) -> Result<(Vec<T>, u64)>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));

        let response = self.send(Method::GET, path, None, Some(headers)).await?;

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);

        let rows: Vec<T> = response.json().await?;
        let total = total.unwrap_or(rows.len() as u64);

        Ok((rows, total))
    }

    /// Number of rows in `table` matching `filters` (PostgREST query syntax).
    pub async fn count(&self, table: &str, filters: &str) -> Result<u64> {
        let separator = if filters.is_empty() { "" } else { "&" };
        let path = format!("/rest/v1/{}?select=id{}{}&limit=1", table, separator, filters);
        let (_, total) = self.request_with_count::<Value>(&path).await?;
        Ok(total)
    }

    pub async fn select<T>(&self, path: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, None).await
    }

    pub async fn select_one<T>(&self, path: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self.select(path).await?;
        Ok(rows.into_iter().next())
    }

    /// Inserts one row into `table` and returns its stored representation.
    pub async fn insert<T>(&self, table: &str, row: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}", table);
        let rows: Vec<T> = self
            .request_with_headers(Method::POST, &path, Some(row), Some(return_representation()))
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Insert into {} returned no rows", table))
    }

    /// Inserts several rows in one statement; PostgREST applies them atomically.
    pub async fn insert_many<T>(&self, table: &str, rows: Vec<Value>) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let path = format!("/rest/v1/{}", table);
        self.request_with_headers(Method::POST, &path, Some(Value::Array(rows)), Some(return_representation()))
            .await
    }

    /// Patches the rows selected by `path`; `None` when nothing matched.
    pub async fn update<T>(&self, path: &str, changes: Value) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self
            .request_with_headers(Method::PATCH, path, Some(changes), Some(return_representation()))
            .await?;

        Ok(rows.into_iter().next())
    }

    /// Deletes the rows selected by `path` in a single statement and returns
    /// how many were removed.
    pub async fn delete(&self, path: &str) -> Result<usize> {
        let rows: Vec<Value> = self
            .request_with_headers(Method::DELETE, path, None, Some(return_representation()))
            .await?;

        Ok(rows.len())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

/// `0-9/42` -> 42, `*/0` -> 0, `0-9/*` -> None.
fn parse_content_range_total(range: &str) -> Option<u64> {
    range.rsplit_once('/').and_then(|(_, total)| total.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-9/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-9/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_unique_violation_detection() {
        let err = anyhow::Error::new(SupabaseError::UniqueViolation {
            message: "duplicate key value violates unique constraint \"patients_medical_record_no_key\"".into(),
            details: "Key (medical_record_no)=(MRN20250615001) already exists.".into(),
        });

        assert!(is_unique_violation(&err));
        assert!(is_unique_violation_on(&err, "medical_record_no"));
        assert!(!is_unique_violation_on(&err, "email"));
        assert!(!is_foreign_key_violation(&err));
    }

    #[test]
    fn test_into_app_error_classification() {
        let unique = anyhow::Error::new(SupabaseError::UniqueViolation {
            message: "duplicate key".into(),
            details: "Key (batch_no)=(B-1) already exists.".into(),
        });
        assert!(matches!(
            into_app_error(unique),
            AppError::Conflict(msg) if msg == "Duplicate value: Key (batch_no)=(B-1) already exists."
        ));

        let fk = anyhow::Error::new(SupabaseError::ForeignKeyViolation("visits_patient_id_fkey".into()));
        assert!(matches!(into_app_error(fk), AppError::BadRequest(_)));

        let check = anyhow::Error::new(SupabaseError::CheckViolation("stock_non_negative".into()));
        assert!(matches!(into_app_error(check), AppError::ValidationError(_)));

        assert!(matches!(into_app_error(anyhow!("timeout")), AppError::Database(_)));
    }

    #[test]
    fn test_plain_errors_are_not_violations() {
        let err = anyhow!("connection reset");
        assert!(!is_unique_violation(&err));
        assert!(as_supabase_error(&err).is_none());
    }
}
