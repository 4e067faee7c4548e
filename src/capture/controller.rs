use std::io::{Read, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::error::CaptureError;
use crate::models::Patient;
use crate::serial::{self, submit, synchronize, DeviceLink, Submission, SyncOutcome};
use crate::settings::Settings;
use crate::storage::{ObjectStore, Publisher, SupabaseStore, TableStore};

use super::pipeline::{SessionPipeline, SessionReport};

/// Runs one capture session at a time. The serial link is handed to a single
/// blocking worker that owns it until the session report comes back.
pub struct CaptureController<O, T> {
    settings: Settings,
    pipeline: Arc<SessionPipeline<O, T>>,
}

impl CaptureController<SupabaseStore, SupabaseStore> {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let store = SupabaseStore::new(&settings.storage)?;
        Ok(Self::new(settings, Publisher::new(store.clone(), store)))
    }
}

impl<O, T> CaptureController<O, T>
where
    O: ObjectStore + 'static,
    T: TableStore + 'static,
{
    pub fn new(settings: Settings, publisher: Publisher<O, T>) -> Self {
        let pipeline = SessionPipeline::new(
            settings.render.clone(),
            publisher,
            settings.protocol.post_ack_delay(),
        );
        Self {
            settings,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Opens the configured serial port and runs a full session on it.
    pub async fn run(&self, patient_id: String, patient_name: String) -> Result<SessionReport> {
        // Refuse bad input before spending the handshake timeout on it.
        Patient::from_input(&patient_id, &patient_name).map_err(CaptureError::Rejected)?;

        let serial_settings = self.settings.serial.clone();
        let link = tokio::task::spawn_blocking(move || serial::open(&serial_settings))
            .await
            .context("serial open worker join failed")??;

        self.run_on(link, patient_id, patient_name).await
    }

    /// Synchronizes, submits the patient, then captures and publishes.
    pub async fn run_on<S>(
        &self,
        link: DeviceLink<S>,
        patient_id: String,
        patient_name: String,
    ) -> Result<SessionReport>
    where
        S: Read + Write + Send + 'static,
    {
        let handshake = self.settings.protocol.handshake();
        let pipeline = Arc::clone(&self.pipeline);

        tokio::task::spawn_blocking(move || -> Result<SessionReport> {
            let mut link = link;

            if synchronize(&mut link, &handshake)? == SyncOutcome::TimedOut {
                return Err(CaptureError::HandshakeTimeout(handshake.ready_timeout).into());
            }

            let patient = match submit(&mut link, &patient_id, &patient_name, &handshake)? {
                Submission::Accepted { patient, confirmed } => {
                    info!(
                        "Patient {} accepted (device confirmed: {confirmed})",
                        patient.id
                    );
                    patient
                }
                Submission::Rejected(reason) => return Err(CaptureError::Rejected(reason).into()),
            };

            Ok(pipeline.run(&mut link, patient))
        })
        .await
        .context("capture worker join failed")?
    }
}
