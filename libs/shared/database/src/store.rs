use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use shared_models::scheduling::{Appointment, Doctor};

/// Source of truth for appointments.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Appointments of `doctor_id` whose `appointment_time` lies in `[start, end)`,
    /// ordered by `appointment_time` ascending. Includes every status.
    async fn find_by_doctor_and_range(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>>;

    async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>>;

    /// Inserts the appointment, or replaces the stored one with the same id.
    async fn save(&self, appointment: &Appointment) -> Result<()>;

    /// Removes every appointment of the doctor and returns how many were removed.
    async fn delete_by_doctor(&self, doctor_id: Uuid) -> Result<usize>;
}

/// Raised by [`DoctorDirectory::save`] when another doctor already holds the email.
#[derive(Debug, Error)]
#[error("email {0} is already registered to another doctor")]
pub struct DuplicateEmail(pub String);

/// Lookup and maintenance of doctor records. Emails are unique per directory.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Doctor>>;

    /// Email comparison is case-insensitive. Wildcard characters match literally.
    async fn find_by_email(&self, email: &str) -> Result<Option<Doctor>>;

    /// Case-insensitive substring match on the doctor's name.
    async fn find_by_name_substring(&self, fragment: &str) -> Result<Vec<Doctor>>;

    /// Case-insensitive exact match on specialty.
    async fn find_by_specialty(&self, specialty: &str) -> Result<Vec<Doctor>>;

    async fn find_all(&self) -> Result<Vec<Doctor>>;

    /// Inserts or replaces the doctor. Fails with [`DuplicateEmail`] when a
    /// different doctor already holds the same email.
    async fn save(&self, doctor: &Doctor) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}
