pub mod locks;
pub mod memory;
pub mod state;
pub mod store;
pub mod supabase;

pub use locks::DoctorLockRegistry;
pub use memory::{InMemoryAppointmentStore, InMemoryDoctorDirectory};
pub use state::ClinicState;
pub use store::{AppointmentStore, DoctorDirectory, DuplicateEmail};
