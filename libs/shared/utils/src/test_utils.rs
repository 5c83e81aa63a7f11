use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request},
    response::Response,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            jwt_refresh_secret: "test-refresh-secret-key-for-jwt-validation".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            jwt_refresh_secret: self.jwt_refresh_secret.clone(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            utc_offset_minutes: 0,
            default_tax_rate: 0.10,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            email: "test@hospital.test".to_string(),
            role: Role::FrontDesk,
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
        }
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn nurse(email: &str) -> Self {
        Self::new(email, Role::Nurse)
    }

    pub fn front_desk(email: &str) -> Self {
        Self::new(email, Role::FrontDesk)
    }

    pub fn pharmacy(email: &str) -> Self {
        Self::new(email, Role::Pharmacy)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    /// HS256-signs `payload` without going through the production issuer, so
    /// tests can mint tokens the issuer would refuse to produce.
    fn sign(payload: serde_json::Value, secret: &str) -> String {
        let encode = |value: serde_json::Value| general_purpose::URL_SAFE_NO_PAD.encode(value.to_string());
        let unsigned = [encode(json!({ "alg": "HS256", "typ": "JWT" })), encode(payload)].join(".");

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac key");
        mac.update(unsigned.as_bytes());

        format!("{}.{}", unsigned, general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    fn token(user: &TestUser, secret: &str, token_type: &str, exp_minutes: i64) -> String {
        let now = Utc::now();
        let exp = now + Duration::minutes(exp_minutes);

        Self::sign(
            json!({
                "sub": user.id,
                "email": user.email,
                "role": user.role,
                "token_type": token_type,
                "iat": now.timestamp(),
                "exp": exp.timestamp()
            }),
            secret,
        )
    }

    pub fn create_test_token(user: &TestUser, secret: &str, exp_minutes: Option<i64>) -> String {
        Self::token(user, secret, "access", exp_minutes.unwrap_or(15))
    }

    pub fn create_refresh_token(user: &TestUser, secret: &str) -> String {
        Self::token(user, secret, "refresh", 60 * 24 * 7)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::token(user, secret, "access", -5)
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(15))
    }

    pub fn create_malformed_token() -> String {
        "not.a.jwt".to_string()
    }

    pub fn bearer(user: &TestUser, config: &AppConfig) -> String {
        format!("Bearer {}", Self::create_test_token(user, &config.jwt_secret, None))
    }
}

/// Builds a JSON request for driving a router with `oneshot`.
pub fn json_request(
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, token);
    }

    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    builder.body(body).expect("valid test request")
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable response body")
        .to_vec()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable response body");
    serde_json::from_slice(&bytes).expect("JSON response body")
}

/// Rows as PostgREST returns them (snake_case columns).
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn patient_response(patient_id: &str, medical_record_no: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "medical_record_no": medical_record_no,
            "name": "Siti Rahma",
            "date_of_birth": "1990-04-12",
            "gender": "FEMALE",
            "phone": "+6281234567890",
            "address": "Jl. Merdeka 10",
            "email": null,
            "blood_type": "O+",
            "allergies": null,
            "emergency_contact": null,
            "created_at": "2025-06-15T08:00:00Z",
            "updated_at": "2025-06-15T08:00:00Z"
        })
    }

    pub fn visit_response(
        visit_id: &str,
        patient_id: &str,
        doctor_id: &str,
        scheduled_at: &str,
        queue_number: &str,
    ) -> serde_json::Value {
        json!({
            "id": visit_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "visit_type": "OUTPATIENT",
            "scheduled_at": scheduled_at,
            "queue_number": queue_number,
            "status": "SCHEDULED",
            "chief_complaint": "Fever",
            "notes": null,
            "created_at": "2025-06-15T08:00:00Z",
            "updated_at": "2025-06-15T08:00:00Z"
        })
    }

    pub fn medical_record_response(record_id: &str, patient_id: &str, doctor_id: &str) -> serde_json::Value {
        json!({
            "id": record_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "visit_id": null,
            "diagnosis": "Acute pharyngitis",
            "icd_code": "J02.9",
            "symptoms": "Sore throat, fever",
            "treatment": "Rest and fluids",
            "prescription": "Paracetamol 500mg",
            "notes": null,
            "blood_pressure": "120/80",
            "heart_rate": 88,
            "temperature": 38.2,
            "weight": 62.5,
            "height": 165.0,
            "created_at": "2025-06-15T09:00:00Z",
            "updated_at": "2025-06-15T09:00:00Z"
        })
    }

    pub fn medicine_response(medicine_id: &str, batches: serde_json::Value) -> serde_json::Value {
        json!({
            "id": medicine_id,
            "name": "Paracetamol",
            "generic_name": "Acetaminophen",
            "category": "Analgesic",
            "unit": "tablet",
            "price": 500.0,
            "description": null,
            "created_at": "2025-06-01T08:00:00Z",
            "updated_at": "2025-06-01T08:00:00Z",
            "medicine_batches": batches
        })
    }

    pub fn batch_response(batch_id: &str, medicine_id: &str, batch_no: &str, stock: i64) -> serde_json::Value {
        json!({
            "id": batch_id,
            "medicine_id": medicine_id,
            "batch_no": batch_no,
            "stock": stock,
            "expiry_date": "2027-01-31",
            "created_at": "2025-06-01T08:00:00Z"
        })
    }

    pub fn billing_response(billing_id: &str, patient_id: &str, status: &str) -> serde_json::Value {
        let paid = status == "PAID";
        let amount_paid = if paid { 2550.0 } else { 0.0 };
        let paid_at = if paid { json!("2025-06-15T10:00:00Z") } else { json!(null) };

        json!({
            "id": billing_id,
            "invoice_no": "INV20250615001",
            "patient_id": patient_id,
            "visit_id": null,
            "items": [
                { "description": "Consultation", "quantity": 2, "unit_price": 1000.0, "amount": 2000.0 },
                { "description": "Paracetamol", "quantity": 1, "unit_price": 500.0, "amount": 500.0 }
            ],
            "subtotal": 2500.0,
            "tax": 250.0,
            "discount": 200.0,
            "total": 2550.0,
            "amount_paid": amount_paid,
            "status": status,
            "payment_method": null,
            "paid_at": paid_at,
            "notes": null,
            "created_at": "2025-06-15T09:30:00Z",
            "updated_at": "2025-06-15T09:30:00Z"
        })
    }

    pub fn user_response(user_id: &str, email: &str, role: &str, password_hash: Option<&str>) -> serde_json::Value {
        json!({
            "id": user_id,
            "email": email,
            "password": password_hash,
            "name": "Test User",
            "role": role,
            "department": null,
            "phone": null,
            "is_active": true,
            "last_login_at": null,
            "created_at": "2025-06-01T08:00:00Z",
            "updated_at": "2025-06-01T08:00:00Z"
        })
    }

    pub fn error_response(code: &str, message: &str, details: &str) -> serde_json::Value {
        json!({
            "code": code,
            "message": message,
            "details": details,
            "hint": null
        })
    }
}
