use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_utils::test_utils::{
    json_body, json_request, JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser,
};
use visit_cell::router::visit_routes;

struct Fixture {
    server: MockServer,
    bearer: String,
    config: std::sync::Arc<shared_config::AppConfig>,
}

async fn fixture(user: TestUser) -> Fixture {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let bearer = JwtTestUtils::bearer(&user, &config);
    Fixture { server, bearer, config }
}

async fn mount_current_visit(server: &MockServer, id: Uuid, scheduled_at: &str, queue: &str, status: &str) {
    let mut row = MockSupabaseResponses::visit_response(
        &id.to_string(),
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        scheduled_at,
        queue,
    );
    row["status"] = json!(status);

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

async fn mount_exists(server: &MockServer, table: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_create_visit_allocates_queue_number_for_scheduled_day() {
    let fx = fixture(TestUser::front_desk("desk@hospital.test")).await;
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    mount_exists(&fx.server, "patients").await;
    mount_exists(&fx.server, "users").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("queue_number", "like.250615-*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "queue_number": "250615-006" }])))
        .mount(&fx.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/visits"))
        .and(body_partial_json(json!({
            "queue_number": "250615-007",
            "status": "SCHEDULED",
            "visit_type": "OUTPATIENT"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::visit_response(
                &Uuid::new_v4().to_string(),
                &patient_id.to_string(),
                &doctor_id.to_string(),
                "2025-06-15T09:30:00Z",
                "250615-007",
            )
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let response = visit_routes(fx.config.clone())
        .oneshot(json_request(
            "POST",
            "/",
            Some(&fx.bearer),
            Some(json!({
                "patientId": patient_id,
                "doctorId": doctor_id,
                "visitType": "OUTPATIENT",
                "scheduledAt": "2025-06-15T09:30:00Z",
                "chiefComplaint": "Fever"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["data"]["queueNumber"], "250615-007");
}

#[tokio::test]
async fn test_create_visit_for_unknown_patient_is_rejected() {
    let fx = fixture(TestUser::front_desk("desk@hospital.test")).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;
    mount_exists(&fx.server, "users").await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let response = visit_routes(fx.config.clone())
        .oneshot(json_request(
            "POST",
            "/",
            Some(&fx.bearer),
            Some(json!({
                "patientId": Uuid::new_v4(),
                "doctorId": Uuid::new_v4(),
                "visitType": "EMERGENCY",
                "scheduledAt": "2025-06-15T09:30:00Z"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Patient not found");
}

#[tokio::test]
async fn test_time_change_within_the_day_keeps_queue_number() {
    let fx = fixture(TestUser::nurse("nurse@hospital.test")).await;
    let id = Uuid::new_v4();

    mount_current_visit(&fx.server, id, "2025-06-15T08:00:00Z", "250615-003", "SCHEDULED").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("queue_number", "like.250615-*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::visit_response(
                &id.to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "2025-06-15T15:00:00Z",
                "250615-003",
            )
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let response = visit_routes(fx.config.clone())
        .oneshot(json_request(
            "PUT",
            &format!("/{}", id),
            Some(&fx.bearer),
            Some(json!({ "scheduledAt": "2025-06-15T15:00:00Z" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["queueNumber"], "250615-003");

    let requests = fx.server.received_requests().await.unwrap();
    let patch = requests.iter().find(|r| r.method.as_str() == "PATCH").unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&patch.body).unwrap();
    assert!(sent.get("queue_number").is_none());
}

#[tokio::test]
async fn test_date_change_renumbers_excluding_the_visit_itself() {
    let fx = fixture(TestUser::front_desk("desk@hospital.test")).await;
    let id = Uuid::new_v4();

    mount_current_visit(&fx.server, id, "2025-06-15T08:00:00Z", "250615-003", "SCHEDULED").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("queue_number", "like.250616-*"))
        .and(query_param("id", format!("neq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "queue_number": "250616-011" }])))
        .expect(1)
        .mount(&fx.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(body_partial_json(json!({
            "queue_number": "250616-012",
            "scheduled_at": "2025-06-16T08:00:00+00:00"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::visit_response(
                &id.to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "2025-06-16T08:00:00Z",
                "250616-012",
            )
        ])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let response = visit_routes(fx.config.clone())
        .oneshot(json_request(
            "PUT",
            &format!("/{}", id),
            Some(&fx.bearer),
            Some(json!({ "scheduledAt": "2025-06-16T08:00:00Z" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["queueNumber"], "250616-012");
}

#[tokio::test]
async fn test_completed_visit_cannot_be_reopened() {
    let fx = fixture(TestUser::doctor("doc@hospital.test")).await;
    let id = Uuid::new_v4();

    mount_current_visit(&fx.server, id, "2025-06-15T08:00:00Z", "250615-003", "COMPLETED").await;

    let response = visit_routes(fx.config.clone())
        .oneshot(json_request(
            "PUT",
            &format!("/{}", id),
            Some(&fx.bearer),
            Some(json!({ "status": "SCHEDULED" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Cannot change visit status from COMPLETED to SCHEDULED"
    );
}

#[tokio::test]
async fn test_list_visits_applies_filters() {
    let fx = fixture(TestUser::doctor("doc@hospital.test")).await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("status", "eq.SCHEDULED"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "0-0/1")
                .set_body_json(json!([MockSupabaseResponses::visit_response(
                    &Uuid::new_v4().to_string(),
                    &Uuid::new_v4().to_string(),
                    &doctor_id.to_string(),
                    "2025-06-15T08:00:00Z",
                    "250615-001",
                )])),
        )
        .expect(1)
        .mount(&fx.server)
        .await;

    let response = visit_routes(fx.config.clone())
        .oneshot(json_request(
            "GET",
            &format!("/?doctorId={}&status=SCHEDULED&date=2025-06-15", doctor_id),
            Some(&fx.bearer),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["visitType"], "OUTPATIENT");

    let requests = fx.server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(query.contains("scheduled_at=gte.2025-06-15T00%3A00%3A00%2B00%3A00"));
    assert!(query.contains("scheduled_at=lt.2025-06-16T00%3A00%3A00%2B00%3A00"));
}

#[tokio::test]
async fn test_pharmacy_cannot_see_visits() {
    let fx = fixture(TestUser::pharmacy("rx@hospital.test")).await;

    let response = visit_routes(fx.config.clone())
        .oneshot(json_request("GET", "/", Some(&fx.bearer), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

async fn mount_count(server: &MockServer, table: &str, visit_id: Uuid, total: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("select", "id"))
        .and(query_param("visit_id", format!("eq.{}", visit_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", format!("*/{}", total))
                .set_body_json(json!([])),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_delete_missing_visit_is_not_found() {
    let fx = fixture(TestUser::front_desk("desk@hospital.test")).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fx.server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let response = visit_routes(fx.config.clone())
        .oneshot(json_request("DELETE", &format!("/{}", Uuid::new_v4()), Some(&fx.bearer), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_visit_with_records_cannot_be_deleted() {
    let fx = fixture(TestUser::front_desk("desk@hospital.test")).await;
    let id = Uuid::new_v4();

    mount_current_visit(&fx.server, id, "2025-06-15T08:00:00Z", "250615-001", "COMPLETED").await;
    mount_count(&fx.server, "medical_records", id, 1).await;
    mount_count(&fx.server, "billings", id, 0).await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": id }])))
        .expect(0)
        .mount(&fx.server)
        .await;

    let response = visit_routes(fx.config.clone())
        .oneshot(json_request("DELETE", &format!("/{}", id), Some(&fx.bearer), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Visit has 1 medical record(s) and 0 billing(s) and cannot be deleted"
    );
}

#[tokio::test]
async fn test_visit_without_dependents_is_deleted() {
    let fx = fixture(TestUser::front_desk("desk@hospital.test")).await;
    let id = Uuid::new_v4();

    mount_current_visit(&fx.server, id, "2025-06-15T08:00:00Z", "250615-001", "CANCELLED").await;
    mount_count(&fx.server, "medical_records", id, 0).await;
    mount_count(&fx.server, "billings", id, 0).await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": id }])))
        .expect(1)
        .mount(&fx.server)
        .await;

    let response = visit_routes(fx.config.clone())
        .oneshot(json_request("DELETE", &format!("/{}", id), Some(&fx.bearer), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["message"], "Visit deleted successfully");
}

#[tokio::test]
async fn test_get_visit_is_idempotent() {
    let fx = fixture(TestUser::nurse("nurse@hospital.test")).await;
    let id = Uuid::new_v4();

    mount_current_visit(&fx.server, id, "2025-06-15T08:00:00Z", "250615-004", "IN_PROGRESS").await;

    let app = visit_routes(fx.config.clone());
    let uri = format!("/{}", id);

    let first = app
        .clone()
        .oneshot(json_request("GET", &uri, Some(&fx.bearer), None))
        .await
        .unwrap();
    let second = app
        .oneshot(json_request("GET", &uri, Some(&fx.bearer), None))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    let first = json_body(first).await;
    assert_eq!(first, json_body(second).await);
    assert_eq!(first["data"]["queueNumber"], "250615-004");
    assert_eq!(first["data"]["status"], "IN_PROGRESS");
}
