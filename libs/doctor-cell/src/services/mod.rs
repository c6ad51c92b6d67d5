pub mod availability;
pub mod doctor;
pub mod filter;
pub mod slots;

pub use availability::AvailabilityService;
pub use doctor::DoctorService;
pub use filter::DoctorFilterService;
pub use slots::SlotGrid;
