use std::future::Future;

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::identifiers::{IdentifierError, IdentifierKind};

use crate::supabase::{into_app_error, is_unique_violation_on, SupabaseClient};

/// Writes that lose a race for the same identifier are retried this many
/// times before the request fails.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 5;

/// Where a day-scoped identifier is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceScope {
    pub kind: IdentifierKind,
    pub table: &'static str,
    pub column: &'static str,
}

pub const MEDICAL_RECORD_NUMBERS: SequenceScope = SequenceScope {
    kind: IdentifierKind::MedicalRecordNumber,
    table: "patients",
    column: "medical_record_no",
};

pub const VISIT_QUEUE_NUMBERS: SequenceScope = SequenceScope {
    kind: IdentifierKind::QueueNumber,
    table: "visits",
    column: "queue_number",
};

pub const INVOICE_NUMBERS: SequenceScope = SequenceScope {
    kind: IdentifierKind::InvoiceNumber,
    table: "billings",
    column: "invoice_no",
};

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error("Could not allocate a unique {label} after {attempts} attempts")]
    Contention { label: &'static str, attempts: u32 },

    #[error("Sequence lookup failed: {0}")]
    Lookup(anyhow::Error),

    /// The write itself failed for a reason other than a taken identifier.
    #[error(transparent)]
    Write(anyhow::Error),
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Identifier(e) => AppError::BadRequest(e.to_string()),
            e @ AllocationError::Contention { .. } => AppError::Internal(e.to_string()),
            AllocationError::Lookup(e) => AppError::Database(format!("Sequence lookup failed: {}", e)),
            AllocationError::Write(e) => into_app_error(e),
        }
    }
}

/// Allocates the next identifier of a day partition and persists it.
///
/// The next value is "greatest existing + 1". Two concurrent writers can
/// compute the same value; the unique index on the column rejects the loser,
/// which recomputes and tries again.
pub struct DailySequence<'a> {
    supabase: &'a SupabaseClient,
    scope: SequenceScope,
}

impl<'a> DailySequence<'a> {
    pub fn new(supabase: &'a SupabaseClient, scope: SequenceScope) -> Self {
        Self { supabase, scope }
    }

    pub fn scope(&self) -> SequenceScope {
        self.scope
    }

    /// Greatest identifier currently stored for `date`. The row `exclude_id`
    /// is left out so a record being moved between days never sees itself.
    pub async fn last_issued(
        &self,
        date: NaiveDate,
        exclude_id: Option<Uuid>,
    ) -> anyhow::Result<Option<String>> {
        let column = self.scope.column;
        let pattern = self.scope.kind.day_pattern(date);

        let mut path = format!(
            "/rest/v1/{table}?select={column}&{column}=like.{pattern}*&order={column}.desc&limit=1",
            table = self.scope.table,
            column = column,
            pattern = pattern,
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let row: Option<Value> = self.supabase.select_one(&path).await?;

        Ok(row.and_then(|r| r.get(column).and_then(Value::as_str).map(str::to_string)))
    }

    /// Identifier the next write for `date` would receive.
    pub async fn peek_next(
        &self,
        date: NaiveDate,
        exclude_id: Option<Uuid>,
    ) -> Result<String, AllocationError> {
        let last = self
            .last_issued(date, exclude_id)
            .await
            .map_err(AllocationError::Lookup)?;

        let next = self.scope.kind.next_after(date, last.as_deref())?;
        debug!("Next {} for {} is {} (last: {:?})", self.scope.kind.label(), date, next, last);

        Ok(next)
    }

    /// Computes the next identifier and hands it to `write`, retrying with a
    /// fresh value whenever the write hits the column's unique index.
    pub async fn allocate<T, F, Fut>(
        &self,
        date: NaiveDate,
        exclude_id: Option<Uuid>,
        mut write: F,
    ) -> Result<T, AllocationError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let candidate = self.peek_next(date, exclude_id).await?;

            match write(candidate.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if is_unique_violation_on(&e, self.scope.column) => {
                    warn!(
                        "{} {} was taken concurrently (attempt {}/{}), recomputing",
                        self.scope.kind.label(),
                        candidate,
                        attempt,
                        MAX_ALLOCATION_ATTEMPTS
                    );
                }
                Err(e) => return Err(AllocationError::Write(e)),
            }
        }

        Err(AllocationError::Contention {
            label: self.scope.kind.label(),
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }
}
