//! HTML and CSV rendering of patient rows.

use std::fmt::Debug;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::models::PatientRecord;

use super::query::encode;

pub const CSV_HEADER: [&str; 8] = [
    "patient_id",
    "patient_name",
    "weight",
    "spo2",
    "pulse",
    "temperature",
    "ecg_image",
    "timestamp",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Display form of a row timestamp. Unparseable values are shown as stored.
pub fn display_timestamp(record: &PatientRecord) -> String {
    match record.parsed_timestamp() {
        Some(parsed) => parsed.format(TIMESTAMP_FORMAT).to_string(),
        None => record.timestamp.clone().unwrap_or_default(),
    }
}

/// Debug formatting keeps the decimal point on whole floats (`98.0`).
fn optional<T: Debug>(value: Option<T>) -> String {
    value.map(|v| format!("{v:?}")).unwrap_or_default()
}

pub fn csv_file_name(patient_id: Option<&str>) -> String {
    format!("patient_data_{}.csv", patient_id.unwrap_or("all"))
}

#[derive(Serialize)]
struct CsvRow<'a> {
    patient_id: &'a str,
    patient_name: &'a str,
    weight: Option<f64>,
    spo2: Option<f64>,
    pulse: Option<i32>,
    temperature: Option<f64>,
    ecg_image: &'a str,
    timestamp: String,
}

impl<'a> From<&'a PatientRecord> for CsvRow<'a> {
    fn from(record: &'a PatientRecord) -> Self {
        Self {
            patient_id: &record.patient_id,
            patient_name: &record.patient_name,
            weight: record.weight,
            spo2: record.spo2,
            pulse: record.pulse,
            temperature: record.temperature,
            ecg_image: record.ecg_image.as_deref().unwrap_or(""),
            timestamp: display_timestamp(record),
        }
    }
}

/// The header is written even when there are no rows.
pub fn render_csv(records: &[PatientRecord]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)
        .context("failed to write CSV header")?;
    for record in records {
        wtr.serialize(CsvRow::from(record))
            .with_context(|| format!("failed to write CSV row for {}", record.patient_id))?;
    }
    wtr.into_inner()
        .map_err(|err| anyhow!("failed to finish CSV export: {}", err.error()))
}

pub fn render_index(records: &[PatientRecord], patient_id: Option<&str>) -> String {
    let filter = escape_html(patient_id.unwrap_or(""));
    let csv_link = match patient_id {
        Some(id) => format!("/download_csv?patient_id={}", encode(id)),
        None => "/download_csv".to_string(),
    };

    let mut html = String::new();
    html.push_str(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Patient Data</title>\n<style>\n\
         body { font-family: sans-serif; margin: 2em; }\n\
         table { border-collapse: collapse; width: 100%; }\n\
         th, td { border: 1px solid #ccc; padding: 6px; text-align: left; }\n\
         th { background: #f0f0f0; }\n\
         img { max-width: 240px; }\n\
         </style>\n</head>\n<body>\n<h1>Patient Data</h1>\n",
    );
    html.push_str(&format!(
        "<form method=\"get\" action=\"/\">\n\
         <input type=\"text\" name=\"patient_id\" placeholder=\"Patient ID\" value=\"{filter}\">\n\
         <button type=\"submit\">Filter</button>\n\
         <a href=\"{}\">Download CSV</a>\n</form>\n",
        escape_html(&csv_link)
    ));

    if records.is_empty() {
        html.push_str("<p>No records found.</p>\n</body>\n</html>\n");
        return html;
    }

    html.push_str("<table>\n<tr>");
    for column in [
        "Patient ID",
        "Name",
        "Weight",
        "SpO2",
        "Pulse",
        "Temperature",
        "ECG",
        "Timestamp",
    ] {
        html.push_str(&format!("<th>{column}</th>"));
    }
    html.push_str("</tr>\n");

    for record in records {
        html.push_str("<tr>");
        for cell in [
            record.patient_id.clone(),
            record.patient_name.clone(),
            optional(record.weight),
            optional(record.spo2),
            optional(record.pulse),
            optional(record.temperature),
        ] {
            html.push_str(&format!("<td>{}</td>", escape_html(&cell)));
        }
        html.push_str(&format!("<td>{}</td>", image_cell(record)));
        html.push_str(&format!(
            "<td>{}</td></tr>\n",
            escape_html(&display_timestamp(record))
        ));
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn image_cell(record: &PatientRecord) -> String {
    let Some(url) = record.ecg_image.as_deref().filter(|url| !url.is_empty()) else {
        return String::new();
    };
    let download = format!(
        "/download_image?url={}&patient_id={}",
        encode(url),
        encode(&record.patient_id)
    );
    format!(
        "<img src=\"{}\" alt=\"ECG\"><br><a href=\"{}\">Download</a>",
        escape_html(url),
        escape_html(&download)
    )
}
