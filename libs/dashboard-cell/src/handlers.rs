use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::Value;

use security_cell::{authorize, Action, Resource};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::response;
use shared_utils::extractor::AppQuery;

use crate::models::ActivityQuery;
use crate::services::DashboardService;

#[axum::debug_handler]
pub async fn get_stats(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Dashboard)?;

    let service = DashboardService::new(&config);
    let stats = service.get_stats().await?;

    Ok(response::success(stats))
}

#[axum::debug_handler]
pub async fn get_activities(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<ActivityQuery>,
) -> Result<Json<Value>, AppError> {
    authorize(&user, Action::Read, Resource::Dashboard)?;

    let service = DashboardService::new(&config);
    let activities = service.recent_activities(query).await?;

    Ok(response::success(activities))
}
