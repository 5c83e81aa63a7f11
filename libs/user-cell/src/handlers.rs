use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use security_cell::{authorize, Action, Resource};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::response;
use shared_utils::extractor::{AppJson, AppPath, AppQuery};

use crate::models::{CreateUserRequest, UpdateUserRequest, UserListQuery};
use crate::services::UserService;

#[axum::debug_handler]
pub async fn list_users(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<UserListQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::User)?;

    let service = UserService::new(&config);
    let (users, pagination) = service.list_users(query).await?;

    Ok(response::paginated(users, pagination))
}

#[axum::debug_handler]
pub async fn export_users(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<UserListQuery>,
) -> Result<Response, AppError> {
    authorize(&user, Action::Read, Resource::User)?;

    let service = UserService::new(&config);
    let sheet = service.export_users(query).await?;

    sheet.into_download("users", config.today())
}

#[axum::debug_handler]
pub async fn get_user(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::User)?;

    let service = UserService::new(&config);
    let account = service.get_user(user_id).await?;

    Ok(response::success(account))
}

#[axum::debug_handler]
pub async fn create_user(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    authorize(&user, Action::Create, Resource::User)?;

    let service = UserService::new(&config);
    let account = service.create_user(request).await?;

    Ok((
        StatusCode::CREATED,
        response::success_with_message(account, "User created successfully"),
    ))
}

#[axum::debug_handler]
pub async fn update_user(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Update, Resource::User)?;

    let service = UserService::new(&config);
    let account = service.update_user(user.id, user_id, request).await?;

    Ok(response::success_with_message(account, "User updated successfully"))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Delete, Resource::User)?;

    let service = UserService::new(&config);
    service.delete_user(user.id, user_id).await?;

    Ok(response::message("User deleted successfully"))
}
