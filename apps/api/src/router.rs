use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use auth_cell::router::auth_routes;
use billing_cell::router::billing_routes;
use dashboard_cell::router::dashboard_routes;
use medical_record_cell::router::medical_record_routes;
use medicine_cell::router::medicine_routes;
use patient_cell::router::patient_routes;
use shared_config::AppConfig;
use user_cell::router::user_routes;
use visit_cell::router::visit_routes;

async fn index() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Hospital Information System API is running"
    }))
}

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/visits", visit_routes(state.clone()))
        .nest("/records", medical_record_routes(state.clone()))
        .nest("/medicines", medicine_routes(state.clone()))
        .nest("/billing", billing_routes(state.clone()))
        .nest("/users", user_routes(state.clone()))
        .nest("/dashboard", dashboard_routes(state));

    Router::new().route("/", get(index)).nest("/api", api)
}
