use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::sequence::AllocationError;
use shared_database::supabase::into_app_error;
use shared_models::error::AppError;

// ==============================================================================
// CORE VISIT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitType {
    Outpatient,
    Inpatient,
    Emergency,
    GeneralCheckup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl VisitStatus {
    pub const ALL: [VisitStatus; 5] = [
        VisitStatus::Scheduled,
        VisitStatus::InProgress,
        VisitStatus::Completed,
        VisitStatus::Cancelled,
        VisitStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "SCHEDULED",
            VisitStatus::InProgress => "IN_PROGRESS",
            VisitStatus::Completed => "COMPLETED",
            VisitStatus::Cancelled => "CANCELLED",
            VisitStatus::NoShow => "NO_SHOW",
        }
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patient columns embedded into visit reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct VisitPatient {
    pub id: Uuid,
    pub name: String,
    pub medical_record_no: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub visit_type: VisitType,
    pub scheduled_at: DateTime<Utc>,
    /// `YYMMDD-NNN`, dated by the local day of `scheduled_at`.
    pub queue_number: String,
    pub status: VisitStatus,
    pub chief_complaint: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<VisitPatient>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisitRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub visit_type: VisitType,
    pub scheduled_at: DateTime<Utc>,
    pub chief_complaint: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVisitRequest {
    pub doctor_id: Option<Uuid>,
    pub visit_type: Option<VisitType>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: Option<VisitStatus>,
    pub chief_complaint: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<VisitStatus>,
    /// Local calendar day of `scheduledAt`.
    pub date: Option<NaiveDate>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Rows that still point at a visit and would lose their link on delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitDependents {
    pub medical_records: u64,
    pub billings: u64,
}

impl VisitDependents {
    pub fn is_empty(&self) -> bool {
        self.medical_records == 0 && self.billings == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VisitError {
    #[error("Visit not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor not found or inactive")]
    DoctorNotFound,

    #[error(
        "Visit has {} medical record(s) and {} billing(s) and cannot be deleted",
        .0.medical_records, .0.billings
    )]
    HasDependents(VisitDependents),

    #[error("Cannot change visit status from {from} to {to}")]
    InvalidStatusTransition { from: VisitStatus, to: VisitStatus },

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),
}

impl From<VisitError> for AppError {
    fn from(err: VisitError) -> Self {
        match err {
            VisitError::NotFound => AppError::NotFound(err.to_string()),
            VisitError::PatientNotFound | VisitError::DoctorNotFound => {
                AppError::BadRequest(err.to_string())
            }
            VisitError::InvalidStatusTransition { .. } | VisitError::HasDependents(_) => {
                AppError::BadRequest(err.to_string())
            }
            VisitError::ValidationError(msg) => AppError::ValidationError(msg),
            VisitError::Allocation(e) => e.into(),
            VisitError::DatabaseError(e) => into_app_error(e),
        }
    }
}
