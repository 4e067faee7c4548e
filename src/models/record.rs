//! Row shape of the hosted `patient_data` table.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Patient, VitalsRecord};

/// One published session. Field names match the table columns; vitals that
/// were not reported are written as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: String,
    pub patient_name: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub spo2: Option<f64>,
    #[serde(default)]
    pub pulse: Option<i32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub ecg_image: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl PatientRecord {
    pub fn new(
        patient: &Patient,
        vitals: &VitalsRecord,
        ecg_image: Option<String>,
        inserted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            patient_id: patient.id.clone(),
            patient_name: patient.name.clone(),
            weight: vitals.weight,
            spo2: vitals.spo2,
            pulse: vitals.pulse,
            temperature: vitals.temperature,
            ecg_image,
            timestamp: Some(inserted_at.to_rfc3339()),
        }
    }

    /// Parses the stored timestamp. Rows written by other tools may carry a
    /// trailing `Z` or no offset at all; offset-less values are taken as UTC.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
