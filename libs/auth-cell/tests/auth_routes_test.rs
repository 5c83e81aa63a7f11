use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::router::auth_routes;
use security_cell::PasswordSecurityService;
use shared_models::auth::{Role, TokenType};
use shared_utils::jwt::validate_token;
use shared_utils::test_utils::{
    json_body, json_request, JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser,
};

const PASSWORD: &str = "Ward-Rounds-42";

async fn mount_user_by_email(server: &MockServer, email: &str, row: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", format!("eq.{}", email)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

async fn mount_last_login_update(server: &MockServer) {
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_returns_token_pair_without_password() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let user = TestUser::doctor("doc@hospital.test");
    let hash = PasswordSecurityService::hash_password(PASSWORD).unwrap();

    mount_user_by_email(
        &server,
        &user.email,
        MockSupabaseResponses::user_response(&user.id.to_string(), &user.email, "DOCTOR", Some(&hash)),
    )
    .await;
    mount_last_login_update(&server).await;

    let app = auth_routes(config.clone());
    let response = app
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "Doc@Hospital.test", "password": PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["role"], "DOCTOR");
    assert_eq!(body["data"]["user"]["isActive"], true);
    assert!(body["data"]["user"].get("password").is_none());

    let access = body["data"]["accessToken"].as_str().unwrap();
    let refresh = body["data"]["refreshToken"].as_str().unwrap();

    let principal = validate_token(access, &config.jwt_secret, TokenType::Access).unwrap();
    assert_eq!(principal.id, user.id);
    assert_eq!(principal.role, Role::Doctor);
    assert!(validate_token(refresh, &config.jwt_refresh_secret, TokenType::Refresh).is_ok());
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let user = TestUser::nurse("nurse@hospital.test");
    let hash = PasswordSecurityService::hash_password(PASSWORD).unwrap();

    mount_user_by_email(
        &server,
        &user.email,
        MockSupabaseResponses::user_response(&user.id.to_string(), &user.email, "NURSE", Some(&hash)),
    )
    .await;

    let response = auth_routes(config)
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": user.email, "password": "not-the-password" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_login_unknown_email_is_unauthorized() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let response = auth_routes(config)
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "ghost@hospital.test", "password": PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_inactive_account_cannot_log_in() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let user = TestUser::front_desk("desk@hospital.test");
    let hash = PasswordSecurityService::hash_password(PASSWORD).unwrap();

    let mut row =
        MockSupabaseResponses::user_response(&user.id.to_string(), &user.email, "FRONT_DESK", Some(&hash));
    row["is_active"] = json!(false);
    mount_user_by_email(&server, &user.email, row).await;

    let response = auth_routes(config)
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": user.email, "password": PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Account is deactivated");
}

#[tokio::test]
async fn test_register_creates_patient_account() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let user_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({
            "email": "siti@mail.test",
            "role": "PATIENT",
            "is_active": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::user_response(&user_id, "siti@mail.test", "PATIENT", Some("$argon2id$stored"))
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let response = auth_routes(config)
        .oneshot(json_request(
            "POST",
            "/register",
            None,
            Some(json!({
                "email": " Siti@Mail.test ",
                "password": PASSWORD,
                "name": "Siti Rahma"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["data"]["user"]["role"], "PATIENT");
    assert!(body["data"]["user"].get("password").is_none());
    assert!(body["data"]["accessToken"].is_string());
}

#[tokio::test]
async fn test_register_rejects_staff_roles() {
    let config = TestConfig::default().to_arc();

    let response = auth_routes(config)
        .oneshot(json_request(
            "POST",
            "/register",
            None,
            Some(json!({
                "email": "mallory@mail.test",
                "password": PASSWORD,
                "name": "Mallory",
                "role": "ADMIN"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let config = TestConfig::default().to_arc();

    let response = auth_routes(config)
        .oneshot(json_request(
            "POST",
            "/register",
            None,
            Some(json!({ "email": "weak@mail.test", "password": "abc", "name": "Weak" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_duplicate_email_is_bad_request() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "23505",
            "duplicate key value violates unique constraint \"users_email_key\"",
            "Key (email)=(taken@mail.test) already exists.",
        )))
        .mount(&server)
        .await;

    let response = auth_routes(config)
        .oneshot(json_request(
            "POST",
            "/register",
            None,
            Some(json!({ "email": "taken@mail.test", "password": PASSWORD, "name": "Taken" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Email taken@mail.test is already registered"
    );
}

#[tokio::test]
async fn test_refresh_token_issues_new_access_token() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let user = TestUser::pharmacy("rx@hospital.test");

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_response(&user.id.to_string(), &user.email, "PHARMACY", None)
        ])))
        .mount(&server)
        .await;

    let refresh = JwtTestUtils::create_refresh_token(&user, &config.jwt_refresh_secret);

    let response = auth_routes(config.clone())
        .oneshot(json_request(
            "POST",
            "/refresh-token",
            None,
            Some(json!({ "refreshToken": refresh })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let access = body["data"]["accessToken"].as_str().unwrap();

    let principal = validate_token(access, &config.jwt_secret, TokenType::Access).unwrap();
    assert_eq!(principal.role, Role::Pharmacy);
}

#[tokio::test]
async fn test_access_token_cannot_be_used_to_refresh() {
    let config = TestConfig::default().to_arc();
    let user = TestUser::admin("admin@hospital.test");
    let access = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let response = auth_routes(config)
        .oneshot(json_request(
            "POST",
            "/refresh-token",
            None,
            Some(json!({ "refreshToken": access })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_requires_a_valid_access_token() {
    let config = TestConfig::default().to_arc();
    let user = TestUser::admin("admin@hospital.test");

    let missing = auth_routes(config.clone())
        .oneshot(json_request("GET", "/me", None, None))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let refresh_as_bearer = format!(
        "Bearer {}",
        JwtTestUtils::create_refresh_token(&user, &config.jwt_secret)
    );
    let wrong_type = auth_routes(config.clone())
        .oneshot(json_request("GET", "/me", Some(&refresh_as_bearer), None))
        .await
        .unwrap();
    assert_eq!(wrong_type.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(wrong_type).await["error"], "Invalid token type");

    let expired = format!("Bearer {}", JwtTestUtils::create_expired_token(&user, &config.jwt_secret));
    let response = auth_routes(config)
        .oneshot(json_request("GET", "/me", Some(&expired), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_current_account() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri()).to_arc();
    let user = TestUser::doctor("doc@hospital.test");

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_response(&user.id.to_string(), &user.email, "DOCTOR", Some("hash"))
        ])))
        .mount(&server)
        .await;

    let bearer = JwtTestUtils::bearer(&user, &config);
    let response = auth_routes(config)
        .oneshot(json_request("GET", "/me", Some(&bearer), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["email"], "doc@hospital.test");
    assert!(body["data"].get("password").is_none());
}

#[tokio::test]
async fn test_logout_acknowledges() {
    let config = TestConfig::default().to_arc();
    let user = TestUser::nurse("nurse@hospital.test");
    let bearer = JwtTestUtils::bearer(&user, &config);

    let response = auth_routes(config)
        .oneshot(json_request("POST", "/logout", Some(&bearer), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["message"], "Logged out successfully");
}
