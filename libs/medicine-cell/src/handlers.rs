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

use crate::models::{
    CreateMedicineRequest, MedicineListQuery, NewBatch, UpdateBatchRequest, UpdateMedicineRequest,
};
use crate::services::MedicineService;

#[axum::debug_handler]
pub async fn list_medicines(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<MedicineListQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Medicine)?;

    let service = MedicineService::new(&config);
    let (medicines, pagination) = service.list_medicines(query).await?;

    Ok(response::paginated(medicines, pagination))
}

#[axum::debug_handler]
pub async fn get_medicine(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(medicine_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Medicine)?;

    let service = MedicineService::new(&config);
    let medicine = service.get_medicine(medicine_id).await?;

    Ok(response::success(medicine))
}

#[axum::debug_handler]
pub async fn create_medicine(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreateMedicineRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    authorize(&user, Action::Create, Resource::Medicine)?;

    let service = MedicineService::new(&config);
    let medicine = service.create_medicine(request).await?;

    Ok((
        StatusCode::CREATED,
        response::success_with_message(medicine, "Medicine created successfully"),
    ))
}

#[axum::debug_handler]
pub async fn update_medicine(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(medicine_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateMedicineRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Update, Resource::Medicine)?;

    let service = MedicineService::new(&config);
    let medicine = service.update_medicine(medicine_id, request).await?;

    Ok(response::success_with_message(medicine, "Medicine updated successfully"))
}

#[axum::debug_handler]
pub async fn delete_medicine(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(medicine_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Delete, Resource::Medicine)?;

    let service = MedicineService::new(&config);
    service.delete_medicine(medicine_id).await?;

    Ok(response::message("Medicine deleted successfully"))
}

#[axum::debug_handler]
pub async fn add_batch(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(medicine_id): AppPath<Uuid>,
    AppJson(request): AppJson<NewBatch>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    authorize(&user, Action::Create, Resource::Medicine)?;

    let service = MedicineService::new(&config);
    let batch = service.add_batch(medicine_id, request).await?;

    Ok((
        StatusCode::CREATED,
        response::success_with_message(batch, "Batch added successfully"),
    ))
}

#[axum::debug_handler]
pub async fn update_batch(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath((medicine_id, batch_id)): AppPath<(Uuid, Uuid)>,
    AppJson(request): AppJson<UpdateBatchRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Update, Resource::Medicine)?;

    let service = MedicineService::new(&config);
    let batch = service.update_batch(medicine_id, batch_id, request).await?;

    Ok(response::success_with_message(batch, "Batch updated successfully"))
}

#[axum::debug_handler]
pub async fn delete_batch(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath((medicine_id, batch_id)): AppPath<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Delete, Resource::Medicine)?;

    let service = MedicineService::new(&config);
    service.delete_batch(medicine_id, batch_id).await?;

    Ok(response::message("Batch deleted successfully"))
}
