//! Hosted storage: an object store for chart images and a table store for
//! patient records.

pub mod publisher;
pub mod supabase;

use anyhow::Result;

use crate::models::PatientRecord;

pub use publisher::{ChartUpload, PublishOutcome, Publisher};
pub use supabase::SupabaseStore;

pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key` and returns the object's public URL.
    fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String>;

    /// Downloads an object by its public URL.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub trait TableStore: Send + Sync {
    /// Inserts one record and returns the rows the store acknowledged. An
    /// empty vector means the store did not confirm the write.
    fn insert(&self, record: &PatientRecord) -> Result<Vec<PatientRecord>>;

    /// All rows, or only those of `patient_id` when given and non-empty.
    fn select(&self, patient_id: Option<&str>) -> Result<Vec<PatientRecord>>;
}
