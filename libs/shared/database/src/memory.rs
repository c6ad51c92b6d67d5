use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::scheduling::{Appointment, Doctor};

use crate::store::{AppointmentStore, DoctorDirectory, DuplicateEmail};

/// Process-local appointment store used when no database is configured and in tests.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }
}

fn sorted_by_time(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by(|a, b| a.appointment_time.cmp(&b.appointment_time));
    appointments
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn find_by_doctor_and_range(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        let matching = appointments
            .values()
            .filter(|apt| apt.doctor_id == doctor_id)
            .filter(|apt| apt.appointment_time >= start && apt.appointment_time < end)
            .cloned()
            .collect();

        Ok(sorted_by_time(matching))
    }

    async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        let matching = appointments
            .values()
            .filter(|apt| apt.patient_id == patient_id)
            .cloned()
            .collect();

        Ok(sorted_by_time(matching))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn save(&self, appointment: &Appointment) -> Result<()> {
        debug!("Saving appointment {} in memory", appointment.id);
        self.appointments
            .write()
            .await
            .insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn delete_by_doctor(&self, doctor_id: Uuid) -> Result<usize> {
        let mut appointments = self.appointments.write().await;
        let before = appointments.len();
        appointments.retain(|_, apt| apt.doctor_id != doctor_id);
        Ok(before - appointments.len())
    }
}

#[derive(Default)]
pub struct InMemoryDoctorDirectory {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_name(mut doctors: Vec<Doctor>) -> Vec<Doctor> {
    doctors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    doctors
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Doctor>> {
        Ok(self.doctors.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Doctor>> {
        let doctors = self.doctors.read().await;
        Ok(doctors
            .values()
            .find(|doctor| doctor.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_name_substring(&self, fragment: &str) -> Result<Vec<Doctor>> {
        let needle = fragment.to_lowercase();
        let doctors = self.doctors.read().await;
        let matching = doctors
            .values()
            .filter(|doctor| doctor.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();

        Ok(sorted_by_name(matching))
    }

    async fn find_by_specialty(&self, specialty: &str) -> Result<Vec<Doctor>> {
        let doctors = self.doctors.read().await;
        let matching = doctors
            .values()
            .filter(|doctor| doctor.specialty.eq_ignore_ascii_case(specialty))
            .cloned()
            .collect();

        Ok(sorted_by_name(matching))
    }

    async fn find_all(&self) -> Result<Vec<Doctor>> {
        let doctors = self.doctors.read().await;
        Ok(sorted_by_name(doctors.values().cloned().collect()))
    }

    async fn save(&self, doctor: &Doctor) -> Result<()> {
        debug!("Saving doctor {} in memory", doctor.id);
        let mut doctors = self.doctors.write().await;
        let taken = doctors
            .values()
            .any(|other| other.id != doctor.id && other.email.eq_ignore_ascii_case(&doctor.email));
        if taken {
            return Err(DuplicateEmail(doctor.email.clone()).into());
        }
        doctors.insert(doctor.id, doctor.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.doctors.write().await.remove(&id);
        Ok(())
    }
}
