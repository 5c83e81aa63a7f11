use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn billing_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_billings).post(create_billing))
        .route("/stats", get(billing_stats))
        .route("/export/excel", get(export_billings))
        .route(
            "/{id}",
            get(get_billing).put(update_billing).delete(delete_billing),
        )
        .route("/{id}/payment", post(record_payment))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
