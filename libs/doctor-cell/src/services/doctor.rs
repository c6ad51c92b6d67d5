use std::sync::{Arc, LazyLock};

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{AppointmentStore, ClinicState, DoctorDirectory, DoctorLockRegistry, DuplicateEmail};
use shared_models::scheduling::Doctor;

use crate::models::{CreateDoctorRequest, DoctorError, UpdateDoctorRequest};
use crate::services::availability::store_failure;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email pattern")
});

fn validate_email(email: &str) -> Result<(), DoctorError> {
    if email.len() <= 254 && EMAIL_PATTERN.is_match(email) {
        Ok(())
    } else {
        Err(DoctorError::ValidationError(format!("Invalid email address: {}", email)))
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), DoctorError> {
    if value.trim().is_empty() {
        return Err(DoctorError::ValidationError(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Maps a directory write error, surfacing a lost race for the same email.
fn save_failure(email: &str, error: anyhow::Error) -> DoctorError {
    if error.is::<DuplicateEmail>() {
        warn!("Rejected duplicate doctor email: {}", email);
        DoctorError::EmailTaken(email.to_string())
    } else {
        store_failure(error)
    }
}

pub fn hash_password(password: &str) -> Result<String, DoctorError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DoctorError::ValidationError(format!("Password could not be hashed: {}", e)))
}

/// False on mismatch and on hashes that cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Administration of doctor records.
pub struct DoctorService {
    doctors: Arc<dyn DoctorDirectory>,
    appointments: Arc<dyn AppointmentStore>,
    locks: Arc<DoctorLockRegistry>,
}

impl DoctorService {
    pub fn new(state: &ClinicState) -> Self {
        Self {
            doctors: Arc::clone(&state.doctors),
            appointments: Arc::clone(&state.appointments),
            locks: Arc::clone(&state.locks),
        }
    }

    pub async fn list(&self) -> Result<Vec<Doctor>, DoctorError> {
        self.doctors.find_all().await.map_err(store_failure)
    }

    pub async fn get(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        self.doctors
            .find_by_id(doctor_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| DoctorError::NotFound(doctor_id.to_string()))
    }

    pub async fn register(&self, request: CreateDoctorRequest) -> Result<Doctor, DoctorError> {
        let email = normalize_email(&request.email);
        debug!("Registering doctor: {}", email);

        require_non_empty("name", &request.name)?;
        require_non_empty("specialty", &request.specialty)?;
        require_non_empty("password", &request.password)?;
        validate_email(&email)?;

        if self
            .doctors
            .find_by_email(&email)
            .await
            .map_err(store_failure)?
            .is_some()
        {
            warn!("Rejected duplicate doctor email: {}", email);
            return Err(DoctorError::EmailTaken(email));
        }

        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            email,
            phone: request.phone,
            specialty: request.specialty.trim().to_string(),
            password_hash: hash_password(&request.password)?,
            created_at: now,
            updated_at: now,
        };

        self.doctors
            .save(&doctor)
            .await
            .map_err(|e| save_failure(&doctor.email, e))?;
        info!("Doctor {} registered with id {}", doctor.email, doctor.id);

        Ok(doctor)
    }

    pub async fn update(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        let mut doctor = self.get(doctor_id).await?;

        if let Some(email) = request.email.as_deref().map(normalize_email) {
            validate_email(&email)?;
            let holder = self
                .doctors
                .find_by_email(&email)
                .await
                .map_err(store_failure)?;
            if holder.is_some_and(|other| other.id != doctor_id) {
                warn!("Doctor {} cannot take email {}", doctor_id, email);
                return Err(DoctorError::EmailTaken(email));
            }
            doctor.email = email;
        }
        if let Some(name) = request.name {
            require_non_empty("name", &name)?;
            doctor.name = name.trim().to_string();
        }
        if let Some(specialty) = request.specialty {
            require_non_empty("specialty", &specialty)?;
            doctor.specialty = specialty.trim().to_string();
        }
        if let Some(phone) = request.phone {
            doctor.phone = Some(phone);
        }
        if let Some(password) = request.password {
            require_non_empty("password", &password)?;
            doctor.password_hash = hash_password(&password)?;
        }

        doctor.updated_at = Utc::now();
        self.doctors
            .save(&doctor)
            .await
            .map_err(|e| save_failure(&doctor.email, e))?;
        info!("Doctor {} updated", doctor_id);

        Ok(doctor)
    }

    /// Removes the doctor together with every appointment referencing it.
    /// Runs under the doctor's scheduling lock so no booking can land between
    /// the cascade and the directory removal.
    pub async fn delete(&self, doctor_id: Uuid) -> Result<usize, DoctorError> {
        let guard = self.locks.acquire(doctor_id).await;
        self.get(doctor_id).await?;

        let removed = self
            .appointments
            .delete_by_doctor(doctor_id)
            .await
            .map_err(store_failure)?;
        self.doctors.delete(doctor_id).await.map_err(store_failure)?;

        drop(guard);
        self.locks.release(doctor_id);

        info!("Doctor {} deleted along with {} appointments", doctor_id, removed);
        Ok(removed)
    }

    /// Checks a doctor's credentials. Issuing a session token is left to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Doctor, DoctorError> {
        let email = normalize_email(email);
        let doctor = self
            .doctors
            .find_by_email(&email)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| DoctorError::NotFound(email.clone()))?;

        if !verify_password(password, &doctor.password_hash) {
            warn!("Failed login for doctor {}", doctor.id);
            return Err(DoctorError::InvalidCredentials);
        }

        info!("Doctor {} logged in", doctor.id);
        Ok(doctor)
    }
}
