use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Chart geometry and the trailing window the chart shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    pub sample_rate_hz: u32,
    pub window_secs: u32,
    pub width: u32,
    pub height: u32,
    /// Keep a copy of every uploaded chart here when set.
    pub chart_dir: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50,
            window_secs: 15,
            width: 3000,
            height: 900,
            chart_dir: None,
        }
    }
}

impl RenderConfig {
    /// Number of trailing samples a chart covers.
    pub fn window_len(&self) -> usize {
        self.window_secs as usize * self.sample_rate_hz as usize
    }
}
