pub mod booking;
pub mod conflict;
pub mod history;
pub mod lifecycle;

pub use booking::AppointmentBookingService;
pub use conflict::ConflictDetectionService;
pub use history::AppointmentHistoryService;
pub use lifecycle::AppointmentLifecycleService;

use tracing::error;

use crate::models::AppointmentError;

pub(crate) fn store_failure(error: anyhow::Error) -> AppointmentError {
    error!("Appointment store failure: {:#}", error);
    AppointmentError::DatabaseError(error.to_string())
}
