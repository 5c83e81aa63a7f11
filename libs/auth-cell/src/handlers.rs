use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};
use serde_json::Value;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::response;
use shared_utils::extractor::AppJson;

use crate::models::{LoginRequest, RefreshTokenRequest, RegisterRequest};
use crate::services::AuthService;

#[axum::debug_handler]
pub async fn login(
    State(config): State<Arc<AppConfig>>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&config);
    let session = service.login(request).await?;

    Ok(response::success_with_message(session, "Login successful"))
}

#[axum::debug_handler]
pub async fn register(
    State(config): State<Arc<AppConfig>>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = AuthService::new(&config);
    let session = service.register(request).await?;

    Ok((
        StatusCode::CREATED,
        response::success_with_message(session, "Registration successful"),
    ))
}

#[axum::debug_handler]
pub async fn refresh_token(
    State(config): State<Arc<AppConfig>>,
    AppJson(request): AppJson<RefreshTokenRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AuthService::new(&config);
    let refreshed = service.refresh(&request.refresh_token).await?;

    Ok(response::success(refreshed))
}

/// Tokens are stateless; clients drop them on logout.
#[axum::debug_handler]
pub async fn logout(Extension(user): Extension<User>) -> Json<Value> {
    info!("User {} logged out", user.id);
    response::message("Logged out successfully")
}

#[axum::debug_handler]
pub async fn me(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Fetching profile for {}", user.id);

    let service = AuthService::new(&config);
    let account = service.me(user.id).await?;

    Ok(response::success(account))
}
