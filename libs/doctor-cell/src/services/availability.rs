use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_database::{AppointmentStore, ClinicState, DoctorDirectory};
use shared_models::scheduling::{Appointment, Doctor};

use crate::models::{AvailabilityResult, AvailabilitySlot, DoctorError, SlotStatus, TimeSlot};
use crate::services::slots::SlotGrid;

pub(crate) fn store_failure(error: anyhow::Error) -> DoctorError {
    error!("Store operation failed: {:#}", error);
    DoctorError::StoreFailure(error.to_string())
}

pub struct AvailabilityService {
    doctors: Arc<dyn DoctorDirectory>,
    appointments: Arc<dyn AppointmentStore>,
    scheduling: SchedulingConfig,
}

impl AvailabilityService {
    pub fn new(state: &ClinicState) -> Self {
        Self {
            doctors: Arc::clone(&state.doctors),
            appointments: Arc::clone(&state.appointments),
            scheduling: state.config.scheduling.clone(),
        }
    }

    fn appointment_duration(&self) -> Duration {
        Duration::minutes(self.scheduling.appointment_duration_minutes)
    }

    /// Free and booked slots of a doctor on `date`.
    pub async fn availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<AvailabilityResult, DoctorError> {
        let doctor = self
            .doctors
            .find_by_id(doctor_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| DoctorError::NotFound(doctor_id.to_string()))?;

        self.availability_for(&doctor, date).await
    }

    /// Same as [`availability`](Self::availability) for an already resolved doctor.
    pub async fn availability_for(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
    ) -> Result<AvailabilityResult, DoctorError> {
        let grid = SlotGrid::from_config(&self.scheduling)?;
        let (day_start, day_end) = grid.day_bounds(date);
        let duration = self.appointment_duration();

        // Appointments starting up to one duration before opening still cover the first slots.
        let window_start = day_start - duration;
        debug!(
            "Fetching appointments for doctor {} between {} and {}",
            doctor.id, window_start, day_end
        );

        let appointments = self
            .appointments
            .find_by_doctor_and_range(doctor.id, window_start, day_end + Duration::seconds(1))
            .await
            .map_err(store_failure)?;

        Ok(compute_availability(
            doctor.id,
            date,
            &grid,
            &appointments,
            duration,
        ))
    }
}

/// Marks each grid slot of `date` as booked when a slot-blocking appointment covers it.
pub fn compute_availability(
    doctor_id: Uuid,
    date: NaiveDate,
    grid: &SlotGrid,
    appointments: &[Appointment],
    duration: Duration,
) -> AvailabilityResult {
    let blocking: Vec<&Appointment> = appointments
        .iter()
        .filter(|apt| apt.doctor_id == doctor_id && apt.status.blocks_slot())
        .collect();

    let slots = grid
        .slots(date)
        .map(|start| {
            let booked = blocking.iter().any(|apt| apt.covers(start, duration));
            AvailabilitySlot {
                slot: TimeSlot {
                    start,
                    end: start + duration,
                },
                status: if booked {
                    SlotStatus::Booked
                } else {
                    SlotStatus::Free
                },
            }
        })
        .collect();

    AvailabilityResult {
        doctor_id,
        date,
        slots,
    }
}
