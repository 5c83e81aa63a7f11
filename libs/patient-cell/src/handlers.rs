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

use crate::models::{CreatePatientRequest, PatientListQuery, PatientSearchQuery, UpdatePatientRequest};
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn list_patients(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<PatientListQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Patient)?;

    let service = PatientService::new(&config);
    let (patients, pagination) = service.list_patients(query).await?;

    Ok(response::paginated(patients, pagination))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Patient)?;

    let service = PatientService::new(&config);
    let patients = service
        .search_patients(query.q.as_deref().unwrap_or_default())
        .await?;

    Ok(response::success(patients))
}

#[axum::debug_handler]
pub async fn export_patients(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<PatientListQuery>,
) -> Result<Response, AppError> {
    authorize(&user, Action::Read, Resource::Patient)?;

    let service = PatientService::new(&config);
    let sheet = service.export_patients(query).await?;

    sheet.into_download("patients", config.today())
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(patient_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Patient)?;

    let service = PatientService::new(&config);
    let patient = service.get_patient(patient_id).await?;

    Ok(response::success(patient))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    authorize(&user, Action::Create, Resource::Patient)?;

    let service = PatientService::new(&config);
    let patient = service.create_patient(request).await?;

    Ok((
        StatusCode::CREATED,
        response::success_with_message(patient, "Patient created successfully"),
    ))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(patient_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Update, Resource::Patient)?;

    let service = PatientService::new(&config);
    let patient = service.update_patient(patient_id, request).await?;

    Ok(response::success_with_message(patient, "Patient updated successfully"))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(patient_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Delete, Resource::Patient)?;

    let service = PatientService::new(&config);
    service.delete_patient(patient_id).await?;

    Ok(response::message("Patient deleted successfully"))
}
