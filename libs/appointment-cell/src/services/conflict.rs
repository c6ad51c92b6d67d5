use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{AppointmentStore, DoctorDirectory};
use shared_models::scheduling::Appointment;

use crate::models::{AppointmentError, ConflictCheck};
use crate::services::store_failure;

pub struct ConflictDetectionService {
    appointments: Arc<dyn AppointmentStore>,
    doctors: Arc<dyn DoctorDirectory>,
    duration: Duration,
}

impl ConflictDetectionService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        doctors: Arc<dyn DoctorDirectory>,
        duration: Duration,
    ) -> Self {
        Self {
            appointments,
            doctors,
            duration,
        }
    }

    /// Checks whether `doctor_id` is free for one appointment starting at `start_time`.
    /// `exclude_appointment_id` lets an appointment be moved without colliding with itself.
    pub async fn check_conflicts(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheck, AppointmentError> {
        self.doctors
            .find_by_id(doctor_id)
            .await
            .map_err(store_failure)?
            .ok_or(AppointmentError::DoctorNotFound(doctor_id))?;

        // Anything starting within one duration on either side could overlap.
        let window_start = start_time - self.duration;
        let window_end = start_time + self.duration;
        debug!(
            "Checking conflicts for doctor {} between {} and {}",
            doctor_id, window_start, window_end
        );

        let existing = self
            .appointments
            .find_by_doctor_and_range(doctor_id, window_start, window_end)
            .await
            .map_err(store_failure)?;

        let conflicting =
            find_conflicts(&existing, start_time, self.duration, exclude_appointment_id);

        if conflicting.is_empty() {
            return Ok(ConflictCheck::Available);
        }

        warn!(
            "Conflict detected for doctor {} at {} - {} conflicting appointments",
            doctor_id,
            start_time,
            conflicting.len()
        );
        Ok(ConflictCheck::Conflict { conflicting })
    }
}

/// Ids of slot-blocking appointments whose interval overlaps `[start_time, start_time + duration)`.
pub fn find_conflicts(
    existing: &[Appointment],
    start_time: DateTime<Utc>,
    duration: Duration,
    exclude_appointment_id: Option<Uuid>,
) -> Vec<Uuid> {
    let end_time = start_time + duration;

    existing
        .iter()
        .filter(|apt| Some(apt.id) != exclude_appointment_id)
        .filter(|apt| apt.status.blocks_slot())
        .filter(|apt| apt.overlaps(start_time, end_time, duration))
        .map(|apt| apt.id)
        .collect()
}
