//! Vitals reported by the sensor station during one session.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum VitalField {
    Weight,
    Spo2,
    Pulse,
    Temperature,
}

impl VitalField {
    pub const ALL: [VitalField; 4] = [
        VitalField::Weight,
        VitalField::Spo2,
        VitalField::Pulse,
        VitalField::Temperature,
    ];

    /// Line prefix the device uses for this field, including the colon.
    pub fn prefix(&self) -> &'static str {
        match self {
            VitalField::Weight => "WEIGHT:",
            VitalField::Spo2 => "SPO2:",
            VitalField::Pulse => "PULSE:",
            VitalField::Temperature => "TEMP:",
        }
    }

    /// Column name in the patient table.
    pub fn as_str(&self) -> &'static str {
        match self {
            VitalField::Weight => "weight",
            VitalField::Spo2 => "spo2",
            VitalField::Pulse => "pulse",
            VitalField::Temperature => "temperature",
        }
    }
}

/// A single parsed vitals line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VitalReading {
    Weight(f64),
    Spo2(f64),
    Pulse(i32),
    Temperature(f64),
}

impl VitalReading {
    pub fn field(&self) -> VitalField {
        match self {
            VitalReading::Weight(_) => VitalField::Weight,
            VitalReading::Spo2(_) => VitalField::Spo2,
            VitalReading::Pulse(_) => VitalField::Pulse,
            VitalReading::Temperature(_) => VitalField::Temperature,
        }
    }
}

/// Optional vitals fields. `None` means the device did not report the field
/// this session; it is stored as null, never as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalsRecord {
    pub weight: Option<f64>,
    pub spo2: Option<f64>,
    pub pulse: Option<i32>,
    pub temperature: Option<f64>,
}

impl VitalsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the reading, replacing any earlier value for the same field.
    pub fn apply(&mut self, reading: VitalReading) {
        match reading {
            VitalReading::Weight(value) => self.weight = Some(value),
            VitalReading::Spo2(value) => self.spo2 = Some(value),
            VitalReading::Pulse(value) => self.pulse = Some(value),
            VitalReading::Temperature(value) => self.temperature = Some(value),
        }
    }

    pub fn reported_count(&self) -> usize {
        [
            self.weight.is_some(),
            self.spo2.is_some(),
            self.pulse.is_some(),
            self.temperature.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_field_keeps_last_value() {
        let mut vitals = VitalsRecord::new();
        vitals.apply(VitalReading::Pulse(70));
        vitals.apply(VitalReading::Pulse(74));

        assert_eq!(vitals.pulse, Some(74));
        assert_eq!(vitals.reported_count(), 1);
    }

    #[test]
    fn missing_fields_serialize_as_null() {
        let mut vitals = VitalsRecord::new();
        vitals.apply(VitalReading::Weight(70.5));

        let json = serde_json::to_value(&vitals).unwrap();
        assert_eq!(json["weight"], serde_json::json!(70.5));
        assert!(json["spo2"].is_null());
        assert!(json["pulse"].is_null());
        assert!(json["temperature"].is_null());
    }

    #[test]
    fn reading_reports_its_field() {
        for (reading, field) in [
            (VitalReading::Weight(1.0), VitalField::Weight),
            (VitalReading::Spo2(1.0), VitalField::Spo2),
            (VitalReading::Pulse(1), VitalField::Pulse),
            (VitalReading::Temperature(1.0), VitalField::Temperature),
        ] {
            assert_eq!(reading.field(), field);
        }
    }
}
