use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use billing_cell::models::BillingStatus;
use shared_database::supabase::into_app_error;
use shared_models::error::AppError;
use visit_cell::models::VisitStatus;

pub const LOW_STOCK_THRESHOLD: i64 = 10;
pub const EXPIRY_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_ACTIVITY_LIMIT: u32 = 10;
pub const MAX_ACTIVITY_LIMIT: u32 = 50;

// ==============================================================================
// STATISTICS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitStatusCount {
    pub status: VisitStatus,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_patients: u64,
    pub new_patients_today: u64,
    pub visits_today: u64,
    pub visits_today_by_status: Vec<VisitStatusCount>,
    pub total_medicines: u64,
    pub low_stock_medicines: u64,
    pub expiring_batches: u64,
    pub unpaid_billings: u64,
    pub revenue_today: f64,
    pub active_users: u64,
}

// ==============================================================================
// ACTIVITY FEED
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    Patient,
    Visit,
    MedicalRecord,
    Billing,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub time_ago: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<u32>,
}

impl ActivityQuery {
    pub fn resolved_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
            .clamp(1, MAX_ACTIVITY_LIMIT)
    }
}

/// Embedded `patient:patients(name)`.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientName {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentPatient {
    pub id: Uuid,
    pub name: String,
    pub medical_record_no: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentVisit {
    pub id: Uuid,
    pub queue_number: String,
    pub status: VisitStatus,
    pub created_at: DateTime<Utc>,
    pub patient: Option<PatientName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentRecord {
    pub id: Uuid,
    pub diagnosis: String,
    pub created_at: DateTime<Utc>,
    pub patient: Option<PatientName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentBilling {
    pub id: Uuid,
    pub invoice_no: String,
    pub total: f64,
    pub status: BillingStatus,
    pub created_at: DateTime<Utc>,
    pub patient: Option<PatientName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockRow {
    #[serde(default)]
    pub medicine_batches: Vec<BatchStock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchStock {
    pub stock: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusRow {
    pub status: VisitStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaidRow {
    pub amount_paid: f64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),
}

impl From<DashboardError> for AppError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::DatabaseError(e) => into_app_error(e),
        }
    }
}
