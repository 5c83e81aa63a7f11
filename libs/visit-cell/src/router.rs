use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn visit_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_visits).post(create_visit))
        .route("/{id}", get(get_visit).put(update_visit).delete(delete_visit))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
