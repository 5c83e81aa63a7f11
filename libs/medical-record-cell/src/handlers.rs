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

use crate::models::{CreateMedicalRecordRequest, MedicalRecordListQuery, UpdateMedicalRecordRequest};
use crate::services::MedicalRecordService;

#[axum::debug_handler]
pub async fn list_records(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<MedicalRecordListQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::MedicalRecord)?;

    let service = MedicalRecordService::new(&config);
    let (records, pagination) = service.list_records(query).await?;

    Ok(response::paginated(records, pagination))
}

#[axum::debug_handler]
pub async fn export_records(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<MedicalRecordListQuery>,
) -> Result<Response, AppError> {
    authorize(&user, Action::Read, Resource::MedicalRecord)?;

    let service = MedicalRecordService::new(&config);
    let sheet = service.export_records(query).await?;

    sheet.into_download("medical-records", config.today())
}

#[axum::debug_handler]
pub async fn get_record(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(record_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::MedicalRecord)?;

    let service = MedicalRecordService::new(&config);
    let record = service.get_record(record_id).await?;

    Ok(response::success(record))
}

#[axum::debug_handler]
pub async fn create_record(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreateMedicalRecordRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    authorize(&user, Action::Create, Resource::MedicalRecord)?;

    let service = MedicalRecordService::new(&config);
    let record = service.create_record(request, user.id).await?;

    Ok((
        StatusCode::CREATED,
        response::success_with_message(record, "Medical record created successfully"),
    ))
}

#[axum::debug_handler]
pub async fn update_record(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(record_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateMedicalRecordRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Update, Resource::MedicalRecord)?;

    let service = MedicalRecordService::new(&config);
    let record = service.update_record(record_id, request).await?;

    Ok(response::success_with_message(record, "Medical record updated successfully"))
}

#[axum::debug_handler]
pub async fn delete_record(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(record_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Delete, Resource::MedicalRecord)?;

    let service = MedicalRecordService::new(&config);
    service.delete_record(record_id).await?;

    Ok(response::message("Medical record deleted successfully"))
}
