use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::sequence::AllocationError;
use shared_database::supabase::into_app_error;
use shared_models::error::AppError;

// ==============================================================================
// BILLING MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    Cancelled,
}

impl BillingStatus {
    pub const ALL: [BillingStatus; 4] = [
        BillingStatus::Unpaid,
        BillingStatus::PartiallyPaid,
        BillingStatus::Paid,
        BillingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Unpaid => "UNPAID",
            BillingStatus::PartiallyPaid => "PARTIALLY_PAID",
            BillingStatus::Paid => "PAID",
            BillingStatus::Cancelled => "CANCELLED",
        }
    }

    /// Still expecting money.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, BillingStatus::Unpaid | BillingStatus::PartiallyPaid)
    }
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A priced line of an invoice. Stored inside the `items` JSON column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct BillingItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct BillingPatient {
    pub id: Uuid,
    pub name: String,
    pub medical_record_no: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct Billing {
    pub id: Uuid,
    pub invoice_no: String,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub items: Vec<BillingItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub discount: f64,
    pub total: f64,
    pub amount_paid: f64,
    pub status: BillingStatus,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<BillingPatient>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingItemInput {
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillingRequest {
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub items: Vec<BillingItemInput>,
    /// Overrides the configured tax rate when present.
    pub tax: Option<f64>,
    pub discount: Option<f64>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBillingRequest {
    pub items: Option<Vec<BillingItemInput>>,
    pub tax: Option<f64>,
    pub discount: Option<f64>,
    pub status: Option<BillingStatus>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Cumulative amount received so far, not an increment.
    pub amount_paid: f64,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub patient_id: Option<Uuid>,
    pub status: Option<BillingStatus>,
}

/// Amount columns read for statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingAmounts {
    pub status: BillingStatus,
    pub total: f64,
    pub amount_paid: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingStats {
    pub total_billings: u64,
    pub by_status: Vec<StatusCount>,
    pub total_billed: f64,
    pub total_collected: f64,
    pub outstanding: f64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Billing not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Paid billings cannot be modified")]
    AlreadyPaid,

    #[error("Cancelled billings cannot accept payments")]
    Cancelled,

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NotFound => AppError::NotFound(err.to_string()),
            BillingError::PatientNotFound | BillingError::AlreadyPaid | BillingError::Cancelled => {
                AppError::BadRequest(err.to_string())
            }
            BillingError::ValidationError(msg) => AppError::ValidationError(msg),
            BillingError::Allocation(e) => e.into(),
            BillingError::DatabaseError(e) => into_app_error(e),
        }
    }
}
