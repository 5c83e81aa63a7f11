use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::supabase::into_app_error;
use shared_models::error::AppError;

// ==============================================================================
// INVENTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct MedicineBatch {
    pub id: Uuid,
    pub medicine_id: Uuid,
    pub batch_no: String,
    pub stock: i64,
    pub expiry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub generic_name: Option<String>,
    pub category: Option<String>,
    pub unit: String,
    pub price: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Embedded `medicine_batches` rows, soonest expiry first.
    #[serde(default, rename(deserialize = "medicine_batches"))]
    pub batches: Vec<MedicineBatch>,
    #[serde(default, skip_deserializing)]
    pub total_stock: i64,
}

impl Medicine {
    /// Fills the derived stock figure and orders batches by expiry.
    pub fn with_stock_summary(mut self) -> Self {
        self.batches.sort_by_key(|batch| batch.expiry_date);
        self.total_stock = self.batches.iter().map(|batch| batch.stock).sum();
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBatch {
    pub batch_no: String,
    pub stock: i64,
    pub expiry_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMedicineRequest {
    pub name: String,
    pub generic_name: Option<String>,
    pub category: Option<String>,
    pub unit: String,
    pub price: f64,
    pub description: Option<String>,
    #[serde(default)]
    pub batches: Vec<NewBatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMedicineRequest {
    pub name: Option<String>,
    pub generic_name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatchRequest {
    pub batch_no: Option<String>,
    pub stock: Option<i64>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicineListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MedicineError {
    #[error("Medicine not found")]
    NotFound,

    #[error("Batch not found")]
    BatchNotFound,

    #[error("Batch number {0} already exists for this medicine")]
    DuplicateBatch(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),
}

impl From<MedicineError> for AppError {
    fn from(err: MedicineError) -> Self {
        match err {
            MedicineError::NotFound | MedicineError::BatchNotFound => AppError::NotFound(err.to_string()),
            MedicineError::DuplicateBatch(_) => AppError::Conflict(err.to_string()),
            MedicineError::ValidationError(msg) => AppError::ValidationError(msg),
            MedicineError::DatabaseError(e) => into_app_error(e),
        }
    }
}
