//! Upload-then-insert publishing of one captured session.
//!
//! The record references the image URL, so no record is written unless the
//! image upload succeeded first. Nothing is retried.

use chrono::Utc;
use serde::Serialize;

use crate::error::PublishError;
use crate::models::{Patient, PatientRecord, VitalsRecord};

use super::{ObjectStore, TableStore};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

pub const CHART_CONTENT_TYPE: &str = "image/png";

/// A rendered chart ready for upload.
#[derive(Debug, Clone)]
pub struct ChartUpload {
    pub file_name: String,
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub success: bool,
    pub image_url: Option<String>,
    pub message: String,
}

pub struct Publisher<O, T> {
    objects: O,
    table: T,
}

impl<O: ObjectStore, T: TableStore> Publisher<O, T> {
    pub fn new(objects: O, table: T) -> Self {
        Self { objects, table }
    }

    pub fn objects(&self) -> &O {
        &self.objects
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn publish(
        &self,
        patient: &Patient,
        vitals: &VitalsRecord,
        chart: Option<&ChartUpload>,
    ) -> PublishOutcome {
        let image_url = match self.upload_chart(chart) {
            Ok(url) => url,
            Err(err) => return PublishOutcome::failed(None, err),
        };
        log_info!("ECG image uploaded. URL: {image_url}");

        let record = PatientRecord::new(patient, vitals, Some(image_url.clone()), Utc::now());
        if let Err(err) = self.insert_record(&record) {
            return PublishOutcome::failed(Some(image_url), err);
        }

        log_info!("Data uploaded successfully for patient {}", patient.id);
        PublishOutcome {
            success: true,
            image_url: Some(image_url),
            message: "Data uploaded successfully".to_string(),
        }
    }

    fn upload_chart(&self, chart: Option<&ChartUpload>) -> Result<String, PublishError> {
        let chart = chart.ok_or(PublishError::NoChart)?;
        self.objects
            .upload(&chart.file_name, &chart.png, CHART_CONTENT_TYPE)
            .map_err(|err| PublishError::Upload(format!("{err:#}")))
    }

    fn insert_record(&self, record: &PatientRecord) -> Result<(), PublishError> {
        let rows = self
            .table
            .insert(record)
            .map_err(|err| PublishError::Insert(format!("{err:#}")))?;
        if rows.is_empty() {
            return Err(PublishError::EmptyInsertResponse);
        }
        Ok(())
    }
}

impl PublishOutcome {
    /// An aborted publish; `image_url` is set when the upload already landed.
    pub fn failed(image_url: Option<String>, err: PublishError) -> Self {
        log_error!("Publish failed: {err}");
        Self {
            success: false,
            image_url,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};

    use super::*;

    #[derive(Default)]
    pub struct MemoryObjects {
        pub fail: bool,
        pub uploads: Mutex<Vec<(String, usize, String)>>,
        pub stored: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl ObjectStore for MemoryObjects {
        fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String> {
            if self.fail {
                return Err(anyhow!("bucket not found"));
            }
            self.uploads
                .lock()
                .unwrap()
                .push((key.to_string(), bytes.len(), content_type.to_string()));
            let url = format!("https://store.test/ecg-images/{key}");
            self.stored
                .lock()
                .unwrap()
                .push((url.clone(), bytes.to_vec()));
            Ok(url)
        }

        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.stored
                .lock()
                .unwrap()
                .iter()
                .find(|(stored, _)| stored == url)
                .map(|(_, bytes)| bytes.clone())
                .ok_or_else(|| anyhow!("no object at {url}"))
        }
    }

    #[derive(Default)]
    pub struct MemoryTable {
        pub fail: bool,
        pub acknowledge: bool,
        pub inserts: Mutex<Vec<PatientRecord>>,
    }

    impl MemoryTable {
        pub fn acknowledging() -> Self {
            Self {
                acknowledge: true,
                ..Self::default()
            }
        }

        pub fn insert_count(&self) -> usize {
            self.inserts.lock().unwrap().len()
        }
    }

    impl TableStore for MemoryTable {
        fn insert(&self, record: &PatientRecord) -> Result<Vec<PatientRecord>> {
            self.inserts.lock().unwrap().push(record.clone());
            if self.fail {
                return Err(anyhow!("permission denied for table patient_data"));
            }
            Ok(if self.acknowledge {
                vec![record.clone()]
            } else {
                Vec::new()
            })
        }

        fn select(&self, patient_id: Option<&str>) -> Result<Vec<PatientRecord>> {
            let rows = self.inserts.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|row| patient_id.map_or(true, |id| row.patient_id == id))
                .cloned()
                .collect())
        }
    }
}
