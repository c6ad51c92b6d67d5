use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use tracing::debug;

use shared_config::SchedulingConfig;
use shared_database::{ClinicState, DoctorDirectory};
use shared_models::scheduling::Doctor;

use crate::models::{DoctorError, DoctorFilter};
use crate::services::availability::{store_failure, AvailabilityService};

pub struct DoctorFilterService {
    doctors: Arc<dyn DoctorDirectory>,
    availability: AvailabilityService,
}

impl DoctorFilterService {
    pub fn new(state: &ClinicState) -> Self {
        Self {
            doctors: Arc::clone(&state.doctors),
            availability: AvailabilityService::new(state),
        }
    }

    /// Doctors matching every criterion present in `filter`, ordered by name.
    pub async fn filter(&self, filter: &DoctorFilter) -> Result<Vec<Doctor>, DoctorError> {
        let candidates = self.candidates(filter).await?;
        let matching: Vec<Doctor> = candidates
            .into_iter()
            .filter(|doctor| filter.matches_record(doctor))
            .collect();

        let Some(half) = filter.time_of_day else {
            return Ok(matching);
        };

        let date = filter.date.unwrap_or_else(|| Utc::now().date_naive());
        let midday = SchedulingConfig::midday();
        debug!(
            "Checking {:?} availability of {} doctors on {}",
            half,
            matching.len(),
            date
        );

        let availabilities = try_join_all(
            matching
                .iter()
                .map(|doctor| self.availability.availability_for(doctor, date)),
        )
        .await?;

        Ok(matching
            .into_iter()
            .zip(availabilities)
            .filter(|(_, availability)| availability.has_free_slot_in(half, midday))
            .map(|(doctor, _)| doctor)
            .collect())
    }

    /// Narrowest directory query the filter allows.
    async fn candidates(&self, filter: &DoctorFilter) -> Result<Vec<Doctor>, DoctorError> {
        let result = match (&filter.name, &filter.specialty) {
            (Some(name), _) => self.doctors.find_by_name_substring(name).await,
            (None, Some(specialty)) => self.doctors.find_by_specialty(specialty).await,
            (None, None) => self.doctors.find_all().await,
        };

        result.map_err(store_failure)
    }
}
