pub mod booking;
pub mod lifecycle;
pub mod search;

pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
