use std::fs;
use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::PublishError;
use crate::models::{Patient, VitalsRecord};
use crate::render::{chart_file_name, chart_title, render, trailing_window, RenderConfig};
use crate::serial::DeviceLink;
use crate::storage::{ChartUpload, ObjectStore, PublishOutcome, Publisher, TableStore};

use super::session::{capture, CaptureEnd, CapturedSession, Session};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub const DATA_UPLOADED: &str = "DATA_UPLOADED";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_id: Uuid,
    pub patient: Patient,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub end: CaptureEnd,
    pub rejected_lines: usize,
    pub dropped_lines: usize,
    pub vitals: VitalsRecord,
    pub samples: usize,
    pub chart_file: Option<String>,
    pub outcome: PublishOutcome,
    pub acknowledged: bool,
}

/// Capture, render, publish and acknowledge for one accepted patient. Runs
/// on the worker that owns the link.
pub struct SessionPipeline<O, T> {
    render: RenderConfig,
    publisher: Publisher<O, T>,
    post_ack_delay: Duration,
}

impl<O: ObjectStore, T: TableStore> SessionPipeline<O, T> {
    pub fn new(render: RenderConfig, publisher: Publisher<O, T>, post_ack_delay: Duration) -> Self {
        Self {
            render,
            publisher,
            post_ack_delay,
        }
    }

    pub fn publisher(&self) -> &Publisher<O, T> {
        &self.publisher
    }

    pub fn run<S: Read + Write>(&self, link: &mut DeviceLink<S>, patient: Patient) -> SessionReport {
        let captured = capture(link, Session::new(patient));
        self.complete(link, captured)
    }

    /// Renders and publishes whatever was captured, including partial data
    /// from a failed stream, and tells the device when the upload landed.
    pub fn complete<S: Read + Write>(
        &self,
        link: &mut DeviceLink<S>,
        captured: CapturedSession,
    ) -> SessionReport {
        let (chart, outcome) = match self.render_chart(&captured) {
            Ok(chart) => {
                let outcome =
                    self.publisher
                        .publish(&captured.patient, &captured.vitals, chart.as_ref());
                (chart, outcome)
            }
            Err(err) => (None, PublishOutcome::failed(None, err)),
        };
        let acknowledged = outcome.success && self.acknowledge(link);

        SessionReport {
            session_id: captured.id,
            patient: captured.patient,
            started_at: captured.started_at,
            finished_at: captured.finished_at,
            end: captured.end,
            rejected_lines: captured.rejected_lines,
            dropped_lines: captured.dropped_lines,
            vitals: captured.vitals,
            samples: captured.ecg.len(),
            chart_file: chart.map(|chart| chart.file_name),
            outcome,
            acknowledged,
        }
    }

    /// `Ok(None)` when nothing was captured; a renderer error aborts the publish.
    fn render_chart(&self, captured: &CapturedSession) -> Result<Option<ChartUpload>, PublishError> {
        let window = trailing_window(&captured.ecg, &self.render);
        let duration_secs = window.len() as f64 / self.render.sample_rate_hz.max(1) as f64;
        let title = chart_title(&captured.patient.name, &captured.patient.id, duration_secs);

        match render(&captured.ecg, &self.render, &title) {
            Ok(Some(chart)) => {
                let file_name = chart_file_name(&captured.patient.id, Local::now().naive_local());
                log_info!(
                    "Rendered {} ({} samples, {:.1}s)",
                    file_name,
                    chart.samples_used,
                    chart.duration_secs
                );
                self.keep_local_copy(&file_name, &chart.png);
                Ok(Some(ChartUpload {
                    file_name,
                    png: chart.png,
                }))
            }
            Ok(None) => {
                log_warn!("Session {}: no ECG data captured", captured.id);
                Ok(None)
            }
            Err(err) => {
                log_error!("Session {}: chart rendering failed: {err:#}", captured.id);
                Err(PublishError::Render(format!("{err:#}")))
            }
        }
    }

    fn keep_local_copy(&self, file_name: &str, png: &[u8]) {
        let Some(dir) = &self.render.chart_dir else {
            return;
        };
        let path = dir.join(file_name);
        let result = fs::create_dir_all(dir).and_then(|_| fs::write(&path, png));
        if let Err(err) = result {
            log_warn!("Could not keep a local copy at {}: {err}", path.display());
        }
    }

    /// Best-effort; a failed write is logged and does not undo the publish.
    fn acknowledge<S: Read + Write>(&self, link: &mut DeviceLink<S>) -> bool {
        match link.send_line(DATA_UPLOADED) {
            Ok(()) => {
                log_info!("Sent upload confirmation to device");
                thread::sleep(self.post_ack_delay);
                true
            }
            Err(err) => {
                log_warn!("Failed to send upload confirmation: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::testing::ScriptedPort;
    use crate::storage::publisher::fakes::{MemoryObjects, MemoryTable};

    fn pipeline(objects: MemoryObjects, table: MemoryTable) -> SessionPipeline<MemoryObjects, MemoryTable> {
        let render = RenderConfig {
            width: 200,
            height: 120,
            ..RenderConfig::default()
        };
        SessionPipeline::new(render, Publisher::new(objects, table), Duration::ZERO)
    }

    fn patient() -> Patient {
        Patient {
            id: "P-3".into(),
            name: "Noor".into(),
        }
    }

    fn session_lines() -> Vec<&'static str> {
        vec!["WEIGHT:80.2", "ECG_START", "500", "510", "505", "DATA_END"]
    }

    #[test]
    fn successful_session_is_published_and_acknowledged() {
        let pipeline = pipeline(MemoryObjects::default(), MemoryTable::acknowledging());
        let mut link = DeviceLink::new(ScriptedPort::new().lines(session_lines()));

        let report = pipeline.run(&mut link, patient());

        assert_eq!(report.end, CaptureEnd::Terminator);
        assert_eq!(report.samples, 3);
        assert!(report.outcome.success);
        assert!(report.acknowledged);
        assert!(report
            .chart_file
            .as_deref()
            .unwrap()
            .starts_with("ecg_graph_P-3_"));
        assert_eq!(link.get_ref().written_text(), "DATA_UPLOADED\n");
    }

    #[test]
    fn failed_publish_is_not_acknowledged() {
        let pipeline = pipeline(MemoryObjects::default(), MemoryTable::default());
        let mut link = DeviceLink::new(ScriptedPort::new().lines(session_lines()));

        let report = pipeline.run(&mut link, patient());

        assert!(!report.outcome.success);
        assert!(!report.acknowledged);
        assert!(link.get_ref().written_text().is_empty());
    }

    #[test]
    fn session_without_ecg_is_not_published() {
        let pipeline = pipeline(MemoryObjects::default(), MemoryTable::acknowledging());
        let mut link = DeviceLink::new(ScriptedPort::new().lines(["PULSE:60", "DATA_END"]));

        let report = pipeline.run(&mut link, patient());

        assert_eq!(report.chart_file, None);
        assert!(!report.outcome.success);
        assert_eq!(pipeline.publisher().table().insert_count(), 0);
    }

    #[test]
    fn render_failure_is_reported_and_nothing_is_published() {
        let render = RenderConfig {
            width: 200,
            height: 120,
            sample_rate_hz: 0,
            ..RenderConfig::default()
        };
        let pipeline = SessionPipeline::new(
            render,
            Publisher::new(MemoryObjects::default(), MemoryTable::acknowledging()),
            Duration::ZERO,
        );
        let mut link = DeviceLink::new(ScriptedPort::new().lines(session_lines()));

        let report = pipeline.run(&mut link, patient());

        assert_eq!(report.samples, 3);
        assert_eq!(report.chart_file, None);
        assert!(!report.outcome.success);
        assert!(report.outcome.message.starts_with("ECG chart rendering failed: "));
        assert!(report.outcome.message.contains("0Hz"));
        assert_ne!(report.outcome.message, PublishError::NoChart.to_string());
        assert!(pipeline.publisher().objects().uploads.lock().unwrap().is_empty());
        assert_eq!(pipeline.publisher().table().insert_count(), 0);
        assert!(!report.acknowledged);
        assert!(link.get_ref().written_text().is_empty());
    }

    #[test]
    fn report_carries_session_times_and_skipped_lines() {
        let pipeline = pipeline(MemoryObjects::default(), MemoryTable::acknowledging());
        let port = ScriptedPort::new().lines([
            "Booting...",
            "SPO2:high",
            "ECG_START",
            "500",
            "noise",
            "DATA_END",
        ]);
        let mut link = DeviceLink::new(port);

        let report = pipeline.run(&mut link, patient());

        assert_eq!(report.dropped_lines, 2);
        assert_eq!(report.rejected_lines, 1);
        assert!(report.finished_at >= report.started_at);
        assert_eq!(report.samples, 1);
    }

    #[test]
    fn partial_capture_is_still_published() {
        let pipeline = pipeline(MemoryObjects::default(), MemoryTable::acknowledging());
        let port = ScriptedPort::new()
            .lines(["ECG_START", "1", "2"])
            .hang_up();
        let mut link = DeviceLink::new(port);

        let report = pipeline.run(&mut link, patient());

        assert!(matches!(report.end, CaptureEnd::StreamError(_)));
        assert_eq!(report.samples, 2);
        assert!(report.outcome.success);
    }

    #[test]
    fn ack_write_failure_does_not_undo_publish() {
        let pipeline = pipeline(MemoryObjects::default(), MemoryTable::acknowledging());
        let port = ScriptedPort::new().lines(session_lines()).failing_writes();
        let mut link = DeviceLink::new(port);

        let report = pipeline.run(&mut link, patient());

        assert!(report.outcome.success);
        assert!(!report.acknowledged);
        assert_eq!(pipeline.publisher().table().insert_count(), 1);
    }

    #[test]
    fn chart_dir_keeps_a_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let render = RenderConfig {
            width: 200,
            height: 120,
            chart_dir: Some(dir.path().join("charts")),
            ..RenderConfig::default()
        };
        let pipeline = SessionPipeline::new(
            render,
            Publisher::new(MemoryObjects::default(), MemoryTable::acknowledging()),
            Duration::ZERO,
        );
        let mut link = DeviceLink::new(ScriptedPort::new().lines(session_lines()));

        let report = pipeline.run(&mut link, patient());

        let saved = dir.path().join("charts").join(report.chart_file.unwrap());
        assert!(saved.exists());
    }
}
