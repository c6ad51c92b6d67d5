use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::OwnedMutexGuard;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use doctor_cell::services::SlotGrid;
use shared_config::SchedulingConfig;
use shared_database::{AppointmentStore, ClinicState, DoctorLockRegistry};
use shared_models::scheduling::{Appointment, AppointmentStatus};

use crate::models::{AppointmentError, ConflictCheck};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::store_failure;

/// Sequences validation, conflict detection and persistence for every
/// appointment state change. Writes happen only after all checks pass.
pub struct AppointmentBookingService {
    appointments: Arc<dyn AppointmentStore>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    locks: Arc<DoctorLockRegistry>,
    scheduling: SchedulingConfig,
}

impl AppointmentBookingService {
    pub fn new(clinic: &ClinicState) -> Self {
        let scheduling = clinic.config.scheduling.clone();

        let conflict_service = ConflictDetectionService::new(
            Arc::clone(&clinic.appointments),
            Arc::clone(&clinic.doctors),
            Duration::minutes(scheduling.appointment_duration_minutes),
        );

        Self {
            appointments: Arc::clone(&clinic.appointments),
            conflict_service,
            lifecycle_service: AppointmentLifecycleService::new(),
            locks: Arc::clone(&clinic.locks),
            scheduling,
        }
    }

    fn validate_start_time(&self, start_time: DateTime<Utc>) -> Result<(), AppointmentError> {
        let grid = SlotGrid::from_config(&self.scheduling)
            .map_err(|e| AppointmentError::ValidationError(e.to_string()))?;

        if !grid.contains(start_time) {
            return Err(AppointmentError::InvalidTime(format!(
                "{} is not a bookable slot between {} and {}",
                start_time, self.scheduling.day_start, self.scheduling.day_end
            )));
        }
        Ok(())
    }

    fn ensure_available(check: ConflictCheck) -> Result<(), AppointmentError> {
        match check {
            ConflictCheck::Available => Ok(()),
            ConflictCheck::Conflict { conflicting } => {
                Err(AppointmentError::ConflictDetected(conflicting))
            }
        }
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .find_by_id(appointment_id)
            .await
            .map_err(store_failure)?
            .ok_or(AppointmentError::NotFound(appointment_id))
    }

    /// Takes the owning doctor's lock, then reads the appointment again under it.
    async fn lock_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<(OwnedMutexGuard<()>, Appointment), AppointmentError> {
        let doctor_id = self.get_appointment(appointment_id).await?.doctor_id;
        let guard = self.locks.acquire(doctor_id).await;
        let appointment = self.get_appointment(appointment_id).await?;
        Ok((guard, appointment))
    }

    #[instrument(skip(self))]
    pub async fn book_appointment(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        appointment_time: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.validate_start_time(appointment_time)?;

        let guard = self.locks.acquire(doctor_id).await;

        let check = match self
            .conflict_service
            .check_conflicts(doctor_id, appointment_time, None)
            .await
        {
            Err(AppointmentError::DoctorNotFound(missing)) => {
                drop(guard);
                self.locks.release(missing);
                return Err(AppointmentError::DoctorNotFound(missing));
            }
            other => other?,
        };
        Self::ensure_available(check)?;

        let appointment = Appointment::scheduled(doctor_id, patient_id, appointment_time);
        self.appointments
            .save(&appointment)
            .await
            .map_err(store_failure)?;

        info!(
            "Appointment {} booked with doctor {} at {}",
            appointment.id, doctor_id, appointment_time
        );
        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        appointment_time: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id).await?;
        self.lifecycle_service.validate_reschedule(current.status)?;
        self.validate_start_time(appointment_time)?;

        let (_guard, mut appointment) = self.lock_appointment(appointment_id).await?;
        self.lifecycle_service.validate_reschedule(appointment.status)?;

        let check = self
            .conflict_service
            .check_conflicts(appointment.doctor_id, appointment_time, Some(appointment_id))
            .await?;
        Self::ensure_available(check)?;

        appointment.appointment_time = appointment_time;
        appointment.updated_at = Utc::now();
        self.appointments
            .save(&appointment)
            .await
            .map_err(store_failure)?;

        info!("Appointment {} moved to {}", appointment_id, appointment_time);
        Ok(appointment)
    }

    /// Cancelling twice reports the appointment as missing rather than succeeding silently.
    #[instrument(skip(self))]
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        requester_patient_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let (_guard, mut appointment) = self.lock_appointment(appointment_id).await?;

        if appointment.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::NotFound(appointment_id));
        }

        if appointment.patient_id != requester_patient_id {
            warn!(
                "Patient {} attempted to cancel appointment {} of another patient",
                requester_patient_id, appointment_id
            );
            return Err(AppointmentError::Unauthorized);
        }

        self.lifecycle_service
            .validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        appointment.status = AppointmentStatus::Cancelled;
        appointment.updated_at = Utc::now();
        self.appointments
            .save(&appointment)
            .await
            .map_err(store_failure)?;

        info!("Appointment {} cancelled", appointment_id);
        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let (_guard, mut appointment) = self.lock_appointment(appointment_id).await?;

        self.lifecycle_service
            .validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        appointment.status = AppointmentStatus::Completed;
        appointment.updated_at = Utc::now();
        self.appointments
            .save(&appointment)
            .await
            .map_err(store_failure)?;

        info!("Appointment {} completed", appointment_id);
        Ok(appointment)
    }
}
