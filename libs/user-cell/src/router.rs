use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn user_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/export/excel", get(export_users))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
