pub mod images;
pub mod registration;
pub mod session;

pub use registration::RegistrationService;
pub use session::SessionService;
