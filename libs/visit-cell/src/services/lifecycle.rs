use tracing::{debug, warn};

use crate::models::{VisitError, VisitStatus};

/// Status rules for a visit. Completed, cancelled and no-show visits are
/// closed; everything else may move freely.
pub struct VisitLifecycle;

impl VisitLifecycle {
    pub fn is_closed(status: VisitStatus) -> bool {
        matches!(
            status,
            VisitStatus::Completed | VisitStatus::Cancelled | VisitStatus::NoShow
        )
    }

    pub fn valid_transitions(current: VisitStatus) -> Vec<VisitStatus> {
        match current {
            VisitStatus::Scheduled => vec![
                VisitStatus::InProgress,
                VisitStatus::Completed,
                VisitStatus::Cancelled,
                VisitStatus::NoShow,
            ],
            VisitStatus::InProgress => vec![
                VisitStatus::Scheduled,
                VisitStatus::Completed,
                VisitStatus::Cancelled,
            ],
            VisitStatus::Completed | VisitStatus::Cancelled | VisitStatus::NoShow => vec![],
        }
    }

    pub fn validate_transition(current: VisitStatus, next: VisitStatus) -> Result<(), VisitError> {
        if current == next {
            return Ok(());
        }

        debug!("Validating visit status transition {} -> {}", current, next);

        if !Self::valid_transitions(current).contains(&next) {
            warn!("Invalid visit status transition attempted: {} -> {}", current, next);
            return Err(VisitError::InvalidStatusTransition {
                from: current,
                to: next,
            });
        }

        Ok(())
    }
}
