// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Status rules. Permissive unless built with `strict`, in which case only
/// the transitions returned by [`get_valid_transitions`](Self::get_valid_transitions)
/// are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService {
    strict: bool,
}

impl AppointmentLifecycleService {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Validate that a status transition is allowed. Setting the current
    /// status again is always allowed.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if current_status == new_status || !self.strict {
            return Ok(());
        }

        debug!("Validating status transition from {} to {}", current_status, new_status);
        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }
        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Scheduled,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Rebooked,
            ],
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Rebooked,
            ],
            AppointmentStatus::Rebooked => vec![
                AppointmentStatus::Scheduled,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
            ],
            // Terminal states
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    pub fn is_terminal(&self, status: AppointmentStatus) -> bool {
        self.get_valid_transitions(status).is_empty()
    }
}
