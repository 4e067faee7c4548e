//! Device synchronization and patient submission.
//!
//! Both steps run before capture starts and own the link exclusively. Lines
//! that arrive while waiting for a marker are logged and dropped.

use std::io::{Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::CaptureError;
use crate::models::Patient;

use super::link::DeviceLink;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const WAKE_SIGNAL: &[u8] = b"\r\n";
pub const READY_MARKER: &str = "READY";
pub const PATIENT_RECEIVED: &str = "PATIENT_RECEIVED";

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// How long to wait for the device to report ready.
    pub ready_timeout: Duration,
    /// Pause after the wake signal; the station reboots when the port opens.
    pub settle: Duration,
    /// Sleep between reads that returned nothing.
    pub poll_interval: Duration,
    pub pre_submit_delay: Duration,
    pub inter_message_delay: Duration,
    pub patient_ack_timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(30),
            settle: Duration::from_secs(5),
            poll_interval: Duration::from_millis(500),
            pre_submit_delay: Duration::from_secs(1),
            inter_message_delay: Duration::from_millis(500),
            patient_ack_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Ready,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The patient info was written to the device. `confirmed` is false when
    /// the device never answered `PATIENT_RECEIVED`; capture proceeds anyway.
    Accepted { patient: Patient, confirmed: bool },
    Rejected(String),
}

pub fn is_ready_marker(line: &str) -> bool {
    line.to_uppercase().contains(READY_MARKER)
}

/// Wakes the device and waits for its ready marker.
pub fn synchronize<S: Read + Write>(
    link: &mut DeviceLink<S>,
    config: &HandshakeConfig,
) -> Result<SyncOutcome, CaptureError> {
    link.send_raw(WAKE_SIGNAL)
        .map_err(CaptureError::StreamWrite)?;
    if !config.settle.is_zero() {
        thread::sleep(config.settle);
    }

    log_info!(
        "Waiting for device ready signal (timeout {:?})",
        config.ready_timeout
    );
    let deadline = Instant::now() + config.ready_timeout;
    while Instant::now() < deadline {
        match link.read_line().map_err(CaptureError::StreamRead)? {
            Some(line) if is_ready_marker(&line) => {
                log_info!("Device synchronization complete ({line:?})");
                return Ok(SyncOutcome::Ready);
            }
            Some(line) => {
                if !line.is_empty() {
                    log_debug!("Discarding pre-handshake line {line:?}");
                }
            }
            None => thread::sleep(config.poll_interval),
        }
    }

    log_warn!(
        "Timed out after {:?} waiting for ready signal; check power, cable, or reset the device",
        config.ready_timeout
    );
    Ok(SyncOutcome::TimedOut)
}

/// Sends the patient id and name to the device, one line each, then waits a
/// bounded time for its confirmation.
pub fn submit<S: Read + Write>(
    link: &mut DeviceLink<S>,
    patient_id: &str,
    patient_name: &str,
    config: &HandshakeConfig,
) -> Result<Submission, CaptureError> {
    let patient = match Patient::from_input(patient_id, patient_name) {
        Ok(patient) => patient,
        Err(reason) => {
            log_warn!("Refusing patient info: {reason}");
            return Ok(Submission::Rejected(reason));
        }
    };

    thread::sleep(config.pre_submit_delay);
    link.send_line(&patient.id)
        .map_err(CaptureError::StreamWrite)?;
    thread::sleep(config.inter_message_delay);
    link.send_line(&patient.name)
        .map_err(CaptureError::StreamWrite)?;
    log_info!("Sent patient info: {} | {}", patient.id, patient.name);

    let confirmed = wait_for_line(link, PATIENT_RECEIVED, config.patient_ack_timeout)?;
    if !confirmed {
        log_warn!(
            "Device did not confirm patient info within {:?}; continuing",
            config.patient_ack_timeout
        );
    }

    Ok(Submission::Accepted { patient, confirmed })
}

fn wait_for_line<S: Read + Write>(
    link: &mut DeviceLink<S>,
    expected: &str,
    timeout: Duration,
) -> Result<bool, CaptureError> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(line) = link.read_line().map_err(CaptureError::StreamRead)? {
            if line == expected {
                return Ok(true);
            }
            if !line.is_empty() {
                log_debug!("Discarding line while waiting for {expected}: {line:?}");
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::testing::ScriptedPort;

    fn fast_config() -> HandshakeConfig {
        HandshakeConfig {
            ready_timeout: Duration::from_millis(100),
            settle: Duration::ZERO,
            poll_interval: Duration::from_millis(5),
            pre_submit_delay: Duration::ZERO,
            inter_message_delay: Duration::ZERO,
            patient_ack_timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn ready_after_boot_chatter() {
        let port = ScriptedPort::new()
            .lines(["ets Jun  8 2016 00:22:57", "boot: ok"])
            .timeout()
            .lines(["Ready"]);
        let mut link = DeviceLink::new(port);

        let outcome = synchronize(&mut link, &fast_config()).unwrap();

        assert_eq!(outcome, SyncOutcome::Ready);
        assert_eq!(link.get_ref().written_text(), "\r\n");
    }

    #[test]
    fn ready_marker_is_case_insensitive() {
        assert!(is_ready_marker("READY"));
        assert!(is_ready_marker("ready"));
        assert!(is_ready_marker("ESP32 READY"));
        assert!(!is_ready_marker("RDY"));
    }

    #[test]
    fn silent_device_times_out() {
        let mut link = DeviceLink::new(ScriptedPort::new().lines(["booting"]));
        let started = Instant::now();

        let outcome = synchronize(&mut link, &fast_config()).unwrap();

        assert_eq!(outcome, SyncOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn closed_stream_during_sync_is_an_error() {
        let mut link = DeviceLink::new(ScriptedPort::new().hang_up());
        let err = synchronize(&mut link, &fast_config()).unwrap_err();
        assert!(matches!(err, CaptureError::StreamRead(_)));
    }

    #[test]
    fn submit_sends_id_then_name_and_waits_for_confirmation() {
        let port = ScriptedPort::new().lines(["noise", "PATIENT_RECEIVED"]);
        let mut link = DeviceLink::new(port);

        let submission = submit(&mut link, " P-17 ", "Ada", &fast_config()).unwrap();

        assert_eq!(
            submission,
            Submission::Accepted {
                patient: Patient {
                    id: "P-17".into(),
                    name: "Ada".into()
                },
                confirmed: true
            }
        );
        assert_eq!(link.get_ref().written_text(), "P-17\nAda\n");
    }

    #[test]
    fn missing_confirmation_is_not_fatal() {
        let mut link = DeviceLink::new(ScriptedPort::new());

        let submission = submit(&mut link, "P-17", "Ada", &fast_config()).unwrap();

        assert!(matches!(
            submission,
            Submission::Accepted {
                confirmed: false,
                ..
            }
        ));
    }

    #[test]
    fn blank_name_is_rejected_without_touching_the_device() {
        let mut link = DeviceLink::new(ScriptedPort::new());

        let submission = submit(&mut link, "P-17", "  ", &fast_config()).unwrap();

        assert!(matches!(submission, Submission::Rejected(_)));
        assert!(link.get_ref().written_text().is_empty());
    }
}
