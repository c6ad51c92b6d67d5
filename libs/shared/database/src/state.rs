use std::sync::Arc;

use tracing::info;

use shared_config::AppConfig;

use crate::locks::DoctorLockRegistry;
use crate::memory::{InMemoryAppointmentStore, InMemoryDoctorDirectory};
use crate::store::{AppointmentStore, DoctorDirectory};
use crate::supabase::{SupabaseAppointmentStore, SupabaseClient, SupabaseDoctorDirectory};

/// Configuration plus the store collaborators every cell is built on.
/// `locks` is shared by every clone so all cells serialise on the same doctor.
#[derive(Clone)]
pub struct ClinicState {
    pub config: Arc<AppConfig>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub doctors: Arc<dyn DoctorDirectory>,
    pub locks: Arc<DoctorLockRegistry>,
}

impl ClinicState {
    pub fn new(
        config: AppConfig,
        appointments: Arc<dyn AppointmentStore>,
        doctors: Arc<dyn DoctorDirectory>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            appointments,
            doctors,
            locks: Arc::new(DoctorLockRegistry::new()),
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryAppointmentStore::new()),
            Arc::new(InMemoryDoctorDirectory::new()),
        )
    }

    pub fn supabase(config: AppConfig) -> Self {
        let client = Arc::new(SupabaseClient::new(&config));
        Self::new(
            config,
            Arc::new(SupabaseAppointmentStore::new(Arc::clone(&client))),
            Arc::new(SupabaseDoctorDirectory::new(client)),
        )
    }

    /// Picks the PostgREST stores when Supabase is configured, memory otherwise.
    pub fn from_config(config: AppConfig) -> Self {
        if config.is_configured() {
            info!("Using Supabase stores at {}", config.supabase_url);
            Self::supabase(config)
        } else {
            info!("Using in-memory stores");
            Self::in_memory(config)
        }
    }
}
