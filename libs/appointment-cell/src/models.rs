use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::{AppError, ErrorKind};
use shared_models::scheduling::{Appointment, AppointmentStatus};

// ==============================================================================
// REQUESTS
// ==============================================================================

/// The patient is taken from the authenticated principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub appointment_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub appointment_time: DateTime<Utc>,
}

// ==============================================================================
// VIEWS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor_name: Option<String>,
    pub end_time: DateTime<Utc>,
}

/// Outcome of a conflict check for a candidate start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictCheck {
    Available,
    Conflict { conflicting: Vec<Uuid> },
}

/// Time-based filter over a patient's appointment history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCondition {
    Past,
    Future,
}

impl HistoryCondition {
    pub fn status(&self) -> AppointmentStatus {
        match self {
            HistoryCondition::Past => AppointmentStatus::Completed,
            HistoryCondition::Future => AppointmentStatus::Scheduled,
        }
    }
}

impl FromStr for HistoryCondition {
    type Err = AppointmentError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "past" => Ok(HistoryCondition::Past),
            "future" => Ok(HistoryCondition::Future),
            other => Err(AppointmentError::ValidationError(format!(
                "Unknown condition '{}', expected past or future",
                other
            ))),
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Appointment conflicts with {} existing booking(s)", .0.len())]
    ConflictDetected(Vec<Uuid>),

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::NotFound(_) | AppointmentError::DoctorNotFound(_) => {
                ErrorKind::NotFound
            }
            AppointmentError::ConflictDetected(_)
            | AppointmentError::InvalidStatusTransition(_) => ErrorKind::Conflict,
            AppointmentError::Unauthorized => ErrorKind::Forbidden,
            AppointmentError::InvalidTime(_) | AppointmentError::ValidationError(_) => {
                ErrorKind::ValidationError
            }
            AppointmentError::DatabaseError(_) => ErrorKind::StoreFailure,
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        AppError::from_kind(error.kind(), error.to_string())
    }
}
