pub mod pdf;
pub mod records;
pub mod validation;

pub use records::ClinicalRecordService;
