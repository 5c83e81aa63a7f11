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

use crate::models::{BillingListQuery, CreateBillingRequest, PaymentRequest, UpdateBillingRequest};
use crate::services::BillingService;

#[axum::debug_handler]
pub async fn list_billings(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<BillingListQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Billing)?;

    let service = BillingService::new(&config);
    let (billings, pagination) = service.list_billings(query).await?;

    Ok(response::paginated(billings, pagination))
}

#[axum::debug_handler]
pub async fn billing_stats(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Billing)?;

    let service = BillingService::new(&config);
    let stats = service.get_stats().await?;

    Ok(response::success(stats))
}

#[axum::debug_handler]
pub async fn export_billings(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<BillingListQuery>,
) -> Result<Response, AppError> {
    authorize(&user, Action::Read, Resource::Billing)?;

    let service = BillingService::new(&config);
    let sheet = service.export_billings(query).await?;

    sheet.into_download("billings", config.today())
}

#[axum::debug_handler]
pub async fn get_billing(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(billing_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Billing)?;

    let service = BillingService::new(&config);
    let billing = service.get_billing(billing_id).await?;

    Ok(response::success(billing))
}

#[axum::debug_handler]
pub async fn create_billing(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreateBillingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    authorize(&user, Action::Create, Resource::Billing)?;

    let service = BillingService::new(&config);
    let billing = service.create_billing(request).await?;

    Ok((
        StatusCode::CREATED,
        response::success_with_message(billing, "Billing created successfully"),
    ))
}

#[axum::debug_handler]
pub async fn update_billing(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(billing_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateBillingRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Update, Resource::Billing)?;

    let service = BillingService::new(&config);
    let billing = service.update_billing(billing_id, request).await?;

    Ok(response::success_with_message(billing, "Billing updated successfully"))
}

#[axum::debug_handler]
pub async fn delete_billing(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(billing_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Delete, Resource::Billing)?;

    let service = BillingService::new(&config);
    service.delete_billing(billing_id).await?;

    Ok(response::message("Billing deleted successfully"))
}

#[axum::debug_handler]
pub async fn record_payment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(billing_id): AppPath<Uuid>,
    AppJson(request): AppJson<PaymentRequest>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Pay, Resource::Billing)?;

    let service = BillingService::new(&config);
    let billing = service.record_payment(billing_id, request).await?;

    Ok(response::success_with_message(billing, "Payment recorded successfully"))
}
