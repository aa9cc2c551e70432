pub mod availability;
pub mod slots;
pub mod specialty;

pub use availability::AvailabilityService;
pub use specialty::SpecialtyService;
