//! Line classification for the capture phase.
//!
//! `step` is a pure transition over `(state, line)`. It never touches the
//! stream or the session buffers; the caller applies the returned effect.

use std::str::FromStr;

use crate::error::LineParseError;
use crate::models::{VitalField, VitalReading};

pub const ECG_START: &str = "ECG_START";
pub const DATA_END: &str = "DATA_END";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    AwaitingLine,
    CapturingEcg,
    Terminated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Blank line, or any line after the terminator.
    Ignored,
    Vital(VitalReading),
    Rejected(LineParseError),
    EcgStarted,
    Sample(i32),
    /// Unrecognized line, or a non-numeric line during ECG capture.
    Dropped,
    Finished,
}

pub fn step(state: CaptureState, line: &str) -> (CaptureState, Effect) {
    let line = line.trim();

    if state == CaptureState::Terminated || line.is_empty() {
        return (state, Effect::Ignored);
    }

    if let Some(result) = classify_vital(line) {
        let effect = match result {
            Ok(reading) => Effect::Vital(reading),
            Err(err) => Effect::Rejected(err),
        };
        return (state, effect);
    }

    match line {
        ECG_START => (CaptureState::CapturingEcg, Effect::EcgStarted),
        DATA_END => (CaptureState::Terminated, Effect::Finished),
        _ if state == CaptureState::CapturingEcg => match line.parse::<i32>() {
            Ok(sample) => (state, Effect::Sample(sample)),
            Err(_) => (state, Effect::Dropped),
        },
        _ => (state, Effect::Dropped),
    }
}

/// Returns `None` when the line carries no vitals prefix.
fn classify_vital(line: &str) -> Option<Result<VitalReading, LineParseError>> {
    let field = VitalField::ALL
        .into_iter()
        .find(|field| line.starts_with(field.prefix()))?;
    let raw = line[field.prefix().len()..].trim();

    let reading = match field {
        VitalField::Weight => parse_value(field, raw).map(VitalReading::Weight),
        VitalField::Spo2 => parse_value(field, raw).map(VitalReading::Spo2),
        VitalField::Pulse => parse_value(field, raw).map(VitalReading::Pulse),
        VitalField::Temperature => parse_value(field, raw).map(VitalReading::Temperature),
    };
    Some(reading)
}

fn parse_value<T: FromStr>(field: VitalField, raw: &str) -> Result<T, LineParseError> {
    raw.parse().map_err(|_| LineParseError {
        field,
        raw: raw.to_string(),
    })
}
