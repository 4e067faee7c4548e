//! Session-scoped capture state.
//!
//! A `Session` owns the vitals and the ECG buffer for exactly one patient
//! visit. Once capture ends it is frozen into a `CapturedSession`, which the
//! renderer and publisher only read.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Patient, VitalField, VitalsRecord};
use crate::serial::DeviceLink;

use super::classifier::{step, CaptureState, Effect};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureEnd {
    Terminator,
    StreamError(String),
}

impl CaptureEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureEnd::Terminator => "Terminator",
            CaptureEnd::StreamError(_) => "StreamError",
        }
    }
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    patient: Patient,
    started_at: DateTime<Utc>,
    state: CaptureState,
    vitals: VitalsRecord,
    ecg: Vec<i32>,
    rejected_lines: usize,
    dropped_lines: usize,
}

impl Session {
    pub fn new(patient: Patient) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient,
            started_at: Utc::now(),
            state: CaptureState::AwaitingLine,
            vitals: VitalsRecord::new(),
            ecg: Vec::new(),
            rejected_lines: 0,
            dropped_lines: 0,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state == CaptureState::Terminated
    }

    /// Classifies one line and applies its effect to this session.
    pub fn feed(&mut self, line: &str) -> Effect {
        let (next, effect) = step(self.state, line);
        self.state = next;

        match &effect {
            Effect::Vital(reading) => {
                log_debug!("Session {}: {} updated", self.id, reading.field().as_str());
                self.vitals.apply(*reading);
            }
            Effect::Sample(sample) => self.ecg.push(*sample),
            Effect::Rejected(err) => {
                self.rejected_lines += 1;
                log_warn!("Session {}: skipping line {line:?}: {err}", self.id);
            }
            Effect::Dropped => self.dropped_lines += 1,
            Effect::EcgStarted => log_info!("Session {}: ECG recording started", self.id),
            Effect::Finished | Effect::Ignored => {}
        }

        effect
    }

    pub fn finish(self, end: CaptureEnd) -> CapturedSession {
        CapturedSession {
            id: self.id,
            patient: self.patient,
            started_at: self.started_at,
            finished_at: Utc::now(),
            end,
            vitals: self.vitals,
            ecg: self.ecg,
            rejected_lines: self.rejected_lines,
            dropped_lines: self.dropped_lines,
        }
    }
}

/// A session after capture stopped. Partial data from a failed stream is kept.
#[derive(Debug, Clone)]
pub struct CapturedSession {
    pub id: Uuid,
    pub patient: Patient,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub end: CaptureEnd,
    pub vitals: VitalsRecord,
    pub ecg: Vec<i32>,
    pub rejected_lines: usize,
    pub dropped_lines: usize,
}

/// Reads lines until `DATA_END` or a stream failure.
///
/// Only individual reads are bounded by the port timeout; a device that goes
/// quiet without hanging up keeps this loop waiting.
pub fn capture<S: Read + Write>(link: &mut DeviceLink<S>, mut session: Session) -> CapturedSession {
    log_info!(
        "Session {}: waiting for sensor data for patient {}",
        session.id,
        session.patient.id
    );

    let end = loop {
        match link.read_line() {
            Ok(Some(line)) => {
                if !line.is_empty() {
                    log_debug!("Received: {line}");
                }
                session.feed(&line);
                if session.is_terminated() {
                    break CaptureEnd::Terminator;
                }
            }
            Ok(None) => continue,
            Err(err) => {
                log_error!("Session {}: error reading serial: {err}", session.id);
                break CaptureEnd::StreamError(err.to_string());
            }
        }
    };

    let captured = session.finish(end);
    log_info!(
        "Session {}: capture complete ({}), {}/{} vitals reported, ecg samples={}",
        captured.id,
        captured.end.as_str(),
        captured.vitals.reported_count(),
        VitalField::ALL.len(),
        captured.ecg.len()
    );
    captured
}
