pub mod record;
pub mod vitals;

pub use record::MedicalRecordService;
