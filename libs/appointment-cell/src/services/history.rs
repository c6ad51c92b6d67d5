use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_database::{AppointmentStore, ClinicState, DoctorDirectory};

use crate::models::{AppointmentError, AppointmentView, HistoryCondition};
use crate::services::store_failure;

pub struct AppointmentHistoryService {
    appointments: Arc<dyn AppointmentStore>,
    doctors: Arc<dyn DoctorDirectory>,
    duration: Duration,
}

impl AppointmentHistoryService {
    pub fn new(state: &ClinicState) -> Self {
        Self {
            appointments: Arc::clone(&state.appointments),
            doctors: Arc::clone(&state.doctors),
            duration: Duration::minutes(state.config.scheduling.appointment_duration_minutes),
        }
    }

    /// A patient's appointments ordered by time, optionally narrowed by
    /// doctor name fragment and by past/future condition.
    pub async fn patient_appointments(
        &self,
        patient_id: Uuid,
        doctor_name: Option<&str>,
        condition: Option<HistoryCondition>,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let mut appointments = self
            .appointments
            .find_by_patient(patient_id)
            .await
            .map_err(store_failure)?;

        if let Some(condition) = condition {
            appointments.retain(|apt| apt.status == condition.status());
        }
        debug!(
            "Patient {} has {} appointments matching {:?}",
            patient_id,
            appointments.len(),
            condition
        );

        let mut names: HashMap<Uuid, Option<String>> = HashMap::new();
        for doctor_id in appointments.iter().map(|apt| apt.doctor_id) {
            if names.contains_key(&doctor_id) {
                continue;
            }
            let doctor = self
                .doctors
                .find_by_id(doctor_id)
                .await
                .map_err(store_failure)?;
            names.insert(doctor_id, doctor.map(|d| d.name));
        }

        let fragment = doctor_name.map(str::to_lowercase);
        let mut views: Vec<AppointmentView> = appointments
            .into_iter()
            .map(|appointment| AppointmentView {
                doctor_name: names.get(&appointment.doctor_id).cloned().flatten(),
                end_time: appointment.end_time(self.duration),
                appointment,
            })
            .filter(|view| match &fragment {
                Some(fragment) => view
                    .doctor_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(fragment.as_str())),
                None => true,
            })
            .collect();

        views.sort_by_key(|view| view.appointment.appointment_time);
        Ok(views)
    }

    /// Every appointment of a doctor starting on `date` (UTC), any status,
    /// optionally only those of one patient.
    pub async fn doctor_schedule(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        patient_id: Option<Uuid>,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let doctor = self
            .doctors
            .find_by_id(doctor_id)
            .await
            .map_err(store_failure)?
            .ok_or(AppointmentError::DoctorNotFound(doctor_id))?;

        let day_start = Utc.from_utc_datetime(&date.and_time(NaiveTime::default()));
        let appointments = self
            .appointments
            .find_by_doctor_and_range(doctor_id, day_start, day_start + Duration::days(1))
            .await
            .map_err(store_failure)?;
        debug!(
            "Doctor {} has {} appointments on {}",
            doctor_id,
            appointments.len(),
            date
        );

        let mut schedule: Vec<AppointmentView> = appointments
            .into_iter()
            .filter(|apt| patient_id.map_or(true, |patient_id| apt.patient_id == patient_id))
            .map(|appointment| AppointmentView {
                doctor_name: Some(doctor.name.clone()),
                end_time: appointment.end_time(self.duration),
                appointment,
            })
            .collect();
        schedule.sort_by_key(|view| view.appointment.appointment_time);

        Ok(schedule)
    }
}
