use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// A freshly booked appointment, always in the `Scheduled` state.
    pub fn scheduled(doctor_id: Uuid, patient_id: Uuid, appointment_time: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id,
            appointment_time,
            status: AppointmentStatus::Scheduled,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn end_time(&self, duration: Duration) -> DateTime<Utc> {
        self.appointment_time + duration
    }

    /// True when `[start, end)` intersects this appointment's occupied interval.
    /// Intervals that only touch at a boundary do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>, duration: Duration) -> bool {
        self.appointment_time < end && start < self.end_time(duration)
    }

    /// True when `instant` falls inside `[appointment_time, appointment_time + duration)`.
    pub fn covers(&self, instant: DateTime<Utc>, duration: Duration) -> bool {
        self.appointment_time <= instant && instant < self.end_time(duration)
    }
}

/// Stored as `Scheduled = 0`, `Completed = 1`, `Cancelled = 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn code(&self) -> u8 {
        match self {
            AppointmentStatus::Scheduled => 0,
            AppointmentStatus::Completed => 1,
            AppointmentStatus::Cancelled => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AppointmentStatus::Scheduled),
            1 => Some(AppointmentStatus::Completed),
            2 => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether an appointment in this state still occupies its time slot.
    pub fn blocks_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl<'de> Deserialize<'de> for AppointmentStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StatusRepr {
            Code(u8),
            Name(String),
        }

        match StatusRepr::deserialize(deserializer)? {
            StatusRepr::Code(code) => AppointmentStatus::from_code(code).ok_or_else(|| {
                serde::de::Error::custom(format!("unknown appointment status code {}", code))
            }),
            StatusRepr::Name(name) => match name.to_ascii_lowercase().as_str() {
                "scheduled" => Ok(AppointmentStatus::Scheduled),
                "completed" => Ok(AppointmentStatus::Completed),
                "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
                other => Err(serde::de::Error::custom(format!(
                    "unknown appointment status '{}'",
                    other
                ))),
            },
        }
    }
}

// ==============================================================================
// DOCTORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialty: String,
    #[serde(default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
