use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::{AppError, ErrorKind};
use shared_models::scheduling::Doctor;

// ==============================================================================
// DOCTOR RECORDS
// ==============================================================================

/// Outward view of a doctor record. The password hash never leaves the cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialty: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Doctor> for DoctorProfile {
    fn from(doctor: Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name,
            email: doctor.email,
            phone: doctor.phone,
            specialty: doctor.specialty,
            created_at: doctor.created_at,
            updated_at: doctor.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialty: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Free,
    Booked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    #[serde(flatten)]
    pub slot: TimeSlot,
    pub status: SlotStatus,
}

impl AvailabilitySlot {
    pub fn is_free(&self) -> bool {
        self.status == SlotStatus::Free
    }
}

/// Every grid slot of one doctor on one date, ordered by start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<AvailabilitySlot>,
}

impl AvailabilityResult {
    pub fn free_slots(&self) -> impl Iterator<Item = &AvailabilitySlot> {
        self.slots.iter().filter(|slot| slot.is_free())
    }

    pub fn free_count(&self) -> usize {
        self.free_slots().count()
    }

    pub fn booked_count(&self) -> usize {
        self.slots.len() - self.free_count()
    }

    pub fn has_free_slot_in(&self, half: TimeOfDay, midday: NaiveTime) -> bool {
        self.free_slots()
            .any(|slot| half.contains(slot.slot.start.time(), midday))
    }
}

// ==============================================================================
// FILTERING
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeOfDay {
    Am,
    Pm,
}

impl TimeOfDay {
    /// AM covers slot starts before `midday`, PM covers `midday` and later.
    pub fn contains(&self, time: NaiveTime, midday: NaiveTime) -> bool {
        match self {
            TimeOfDay::Am => time < midday,
            TimeOfDay::Pm => time >= midday,
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = DoctorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "am" | "morning" => Ok(TimeOfDay::Am),
            "pm" | "afternoon" => Ok(TimeOfDay::Pm),
            other => Err(DoctorError::ValidationError(format!(
                "Unknown time of day '{}', expected AM or PM",
                other
            ))),
        }
    }
}

/// Criteria for the doctor filter. Absent criteria do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorFilter {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub time_of_day: Option<TimeOfDay>,
    pub date: Option<NaiveDate>,
}

impl DoctorFilter {
    pub fn by_name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_specialty(mut self, specialty: &str) -> Self {
        self.specialty = Some(specialty.to_string());
        self
    }

    pub fn with_time_of_day(mut self, half: TimeOfDay) -> Self {
        self.time_of_day = Some(half);
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Name and specialty criteria, checked against the stored record only.
    pub fn matches_record(&self, doctor: &Doctor) -> bool {
        let name_matches = self.name.as_deref().map_or(true, |fragment| {
            doctor
                .name
                .to_lowercase()
                .contains(&fragment.to_lowercase())
        });

        let specialty_matches = self
            .specialty
            .as_deref()
            .map_or(true, |specialty| doctor.specialty.eq_ignore_ascii_case(specialty));

        name_matches && specialty_matches
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DoctorError {
    #[error("Doctor not found: {0}")]
    NotFound(String),

    #[error("A doctor with email {0} already exists")]
    EmailTaken(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store failure: {0}")]
    StoreFailure(String),
}

impl DoctorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DoctorError::NotFound(_) => ErrorKind::NotFound,
            DoctorError::EmailTaken(_) => ErrorKind::Conflict,
            DoctorError::InvalidCredentials => ErrorKind::Forbidden,
            DoctorError::ValidationError(_) => ErrorKind::ValidationError,
            DoctorError::StoreFailure(_) => ErrorKind::StoreFailure,
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(error: DoctorError) -> Self {
        AppError::from_kind(error.kind(), error.to_string())
    }
}
