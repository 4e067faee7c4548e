//! Raw line recorder for bench testing the ECG front end.
//!
//! Every non-empty line is written as `<unix seconds>,<line>` under a
//! `Time,ECG_Value` header until the token is cancelled or the stream fails.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::serial::DeviceLink;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub lines: usize,
    pub stream_error: Option<String>,
}

pub fn record<S, W>(
    link: &mut DeviceLink<S>,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<RecordSummary>
where
    S: Read + Write,
    W: Write,
{
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["Time", "ECG_Value"])
        .context("failed to write CSV header")?;
    log_info!("Recording data... Press CTRL+C to stop.");

    let mut lines = 0;
    let mut stream_error = None;
    while !cancel.is_cancelled() {
        match link.read_line() {
            Ok(Some(line)) if !line.is_empty() => {
                let timestamp = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
                wtr.write_record([format!("{timestamp:.6}"), line])
                    .context("failed to write recorded line")?;
                lines += 1;
            }
            Ok(_) => {}
            Err(err) => {
                log_warn!("Recording stopped by stream error: {err}");
                stream_error = Some(err.to_string());
                break;
            }
        }
    }

    wtr.flush().context("failed to flush recording")?;
    log_info!("Recording stopped after {lines} lines");
    Ok(RecordSummary {
        lines,
        stream_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::testing::ScriptedPort;

    #[test]
    fn writes_header_and_timestamped_lines() {
        let port = ScriptedPort::new()
            .lines(["512", "", "noise, with comma"])
            .hang_up();
        let mut link = DeviceLink::new(port);
        let mut out = Vec::new();

        let summary = record(&mut link, &mut out, &CancellationToken::new()).unwrap();

        assert_eq!(summary.lines, 2);
        assert!(summary.stream_error.is_some());
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows[0], "Time,ECG_Value");
        assert!(rows[1].ends_with(",512"));
        assert!(rows[2].ends_with(",\"noise, with comma\""));
        let seconds: f64 = rows[1].split(',').next().unwrap().parse().unwrap();
        assert!(seconds > 1_600_000_000.0);
    }

    #[test]
    fn cancelled_token_stops_before_reading() {
        let token = CancellationToken::new();
        token.cancel();
        let mut link = DeviceLink::new(ScriptedPort::new().lines(["1", "2"]));
        let mut out = Vec::new();

        let summary = record(&mut link, &mut out, &token).unwrap();

        assert_eq!(summary.lines, 0);
        assert_eq!(summary.stream_error, None);
    }
}
