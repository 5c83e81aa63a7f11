use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn medicine_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_medicines).post(create_medicine))
        .route(
            "/{id}",
            get(get_medicine).put(update_medicine).delete(delete_medicine),
        )
        .route("/{id}/batch", post(add_batch))
        .route("/{id}/batch/{batch_id}", put(update_batch).delete(delete_batch))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
