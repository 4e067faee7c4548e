pub mod patient;
pub mod record;
pub mod vitals;

pub use patient::Patient;
pub use record::PatientRecord;
pub use vitals::{VitalField, VitalReading, VitalsRecord};
