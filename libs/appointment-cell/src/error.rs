use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::directory::DirectoryError;
use shared_models::error::AppError;

use crate::models::AppointmentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictParty {
    Doctor,
    Patient,
}

impl ConflictParty {
    pub fn label(&self) -> &'static str {
        match self {
            ConflictParty::Doctor => "doctor",
            ConflictParty::Patient => "patient",
        }
    }
}

/// A business rule that refused an otherwise well-formed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("Cancellations require at least {hours} hours notice")]
    CancellationNotice { hours: i64 },

    #[error("Patients can only reschedule at least {hours} hours before the appointment")]
    RescheduleNotice { hours: i64 },

    #[error("This appointment was already rescheduled {limit} times by the patient")]
    RescheduleLimit { limit: u8 },

    #[error("The payment for this appointment is already settled")]
    PaymentSettled,

    #[error("Appointment is already {0}")]
    Terminal(AppointmentStatus),

    #[error("Cannot {action} an appointment that is {from}")]
    TransitionNotAllowed { action: &'static str, from: AppointmentStatus },

    #[error("Appointments must be scheduled for a future time")]
    SlotInPast,

    #[error("Appointments must start between {open}:00 and {close}:00")]
    OutsideBusinessHours { open: u32, close: u32 },

    #[error("The clinic does not schedule appointments on Sundays")]
    ClosedDay,
}

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("{0}")]
    Validation(String),

    #[error("The {} already has an appointment in this slot", .0.label())]
    Conflict(ConflictParty),

    #[error(transparent)]
    Rule(#[from] RuleViolation),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("Appointment {0} was modified by another request, reload and retry")]
    Stale(uuid::Uuid),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<DirectoryError> for AppointmentError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Storage(msg) => AppointmentError::Storage(msg),
            other => AppointmentError::Validation(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::Conflict(_) => AppError::Conflict(err.to_string()),
            AppointmentError::Rule(rule) => AppError::BadRequest(rule.to_string()),
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::Stale(_) => AppError::Conflict(err.to_string()),
            AppointmentError::Storage(msg) => AppError::Database(msg),
        }
    }
}
