use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::render::RenderConfig;
use crate::serial::HandshakeConfig;

pub const DEFAULT_SETTINGS_FILE: &str = "vitals-capture.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud_rate: 115_200,
            read_timeout_ms: 1_000,
        }
    }
}

/// Protocol timings, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProtocolSettings {
    pub ready_timeout_ms: u64,
    pub settle_ms: u64,
    pub poll_interval_ms: u64,
    pub pre_submit_delay_ms: u64,
    pub inter_message_delay_ms: u64,
    pub patient_ack_timeout_ms: u64,
    /// How long to keep the port open after acknowledging an upload.
    pub post_ack_delay_ms: u64,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            ready_timeout_ms: 30_000,
            settle_ms: 5_000,
            poll_interval_ms: 500,
            pre_submit_delay_ms: 1_000,
            inter_message_delay_ms: 500,
            patient_ack_timeout_ms: 5_000,
            post_ack_delay_ms: 2_000,
        }
    }
}

impl ProtocolSettings {
    pub fn handshake(&self) -> HandshakeConfig {
        HandshakeConfig {
            ready_timeout: Duration::from_millis(self.ready_timeout_ms),
            settle: Duration::from_millis(self.settle_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            pre_submit_delay: Duration::from_millis(self.pre_submit_delay_ms),
            inter_message_delay: Duration::from_millis(self.inter_message_delay_ms),
            patient_ack_timeout: Duration::from_millis(self.patient_ack_timeout_ms),
        }
    }

    pub fn post_ack_delay(&self) -> Duration {
        Duration::from_millis(self.post_ack_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageSettings {
    pub url: String,
    #[serde(skip_serializing)]
    pub key: String,
    pub bucket: String,
    pub table: String,
    pub timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            bucket: "ecg-images".into(),
            table: "patient_data".into(),
            timeout_secs: 30,
        }
    }
}

impl StorageSettings {
    pub fn ensure_configured(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            bail!("storage url is not configured (set SUPABASE_URL or storage.url)");
        }
        if self.key.trim().is_empty() {
            bail!("storage key is not configured (set SUPABASE_KEY or storage.key)");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardSettings {
    pub bind: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub serial: SerialSettings,
    pub protocol: ProtocolSettings,
    pub render: RenderConfig,
    pub storage: StorageSettings,
    pub dashboard: DashboardSettings,
}

impl Settings {
    /// Loads settings from `path`, or from `vitals-capture.json` in the working
    /// directory when no path is given, then applies environment overrides.
    /// An explicit path must exist; the implicit file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let implicit = PathBuf::from(DEFAULT_SETTINGS_FILE);
                if implicit.exists() {
                    Self::read_file(&implicit)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_overrides(|name| env::var(name).ok())?;
        Ok(settings)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    /// Applies `VITALS_*` / `SUPABASE_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(port) = var("VITALS_SERIAL_PORT") {
            self.serial.port = port;
        }
        if let Some(baud) = var("VITALS_BAUD_RATE") {
            self.serial.baud_rate = baud
                .trim()
                .parse()
                .with_context(|| format!("VITALS_BAUD_RATE is not a number: {baud}"))?;
        }
        if let Some(url) = var("SUPABASE_URL") {
            self.storage.url = url;
        }
        if let Some(key) = var("SUPABASE_KEY") {
            self.storage.key = key;
        }
        if let Some(bucket) = var("VITALS_BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Some(table) = var("VITALS_TABLE") {
            self.storage.table = table;
        }
        if let Some(bind) = var("VITALS_DASHBOARD_BIND") {
            self.dashboard.bind = bind;
        }
        if let Some(dir) = var("VITALS_CHART_DIR") {
            self.render.chart_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }
}
