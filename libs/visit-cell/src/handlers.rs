use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
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

use crate::models::{CreateVisitRequest, UpdateVisitRequest, VisitListQuery};
use crate::services::VisitService;

#[axum::debug_handler]
pub async fn list_visits(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<VisitListQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Visit)?;

    let service = VisitService::new(&config);
    let (visits, pagination) = service.list_visits(query).await?;

    Ok(response::paginated(visits, pagination))
}

#[axum::debug_handler]
pub async fn get_visit(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(visit_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Visit)?;

    let service = VisitService::new(&config);
    let visit = service.get_visit(visit_id).await?;

    Ok(response::success(visit))
}

#[axum::debug_handler]
pub async fn create_visit(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreateVisitRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    authorize(&user, Action::Create, Resource::Visit)?;

    let service = VisitService::new(&config);
    let visit = service.create_visit(request).await?;

    Ok((
        StatusCode::CREATED,
        response::success_with_message(visit, "Visit created successfully"),
    ))
}

#[axum::debug_handler]
pub async fn update_visit(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(visit_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateVisitRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Update, Resource::Visit)?;

    let service = VisitService::new(&config);
    let visit = service.update_visit(visit_id, request).await?;

    Ok(response::success_with_message(visit, "Visit updated successfully"))
}

#[axum::debug_handler]
pub async fn delete_visit(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(visit_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Delete, Resource::Visit)?;

    let service = VisitService::new(&config);
    service.delete_visit(visit_id).await?;

    Ok(response::message("Visit deleted successfully"))
}
