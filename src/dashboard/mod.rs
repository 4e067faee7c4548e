//! Read-only web view over the published patient rows.
//!
//! Routing is plain data in and out (`Dashboard::handle`) so it can be tested
//! without a socket; `server` binds it to `tiny_http`.

pub mod page;
pub mod query;
pub mod server;

use crate::storage::{ObjectStore, TableStore};

pub use server::serve;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_warn};

pub const HTML: &str = "text/html; charset=utf-8";
pub const CSV: &str = "text/csv; charset=utf-8";
pub const PNG: &str = "image/png";
pub const TEXT: &str = "text/plain; charset=utf-8";

/// A routed response before it is written to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// File name offered to the browser as a download.
    pub attachment: Option<String>,
}

impl Reply {
    fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
            attachment: None,
        }
    }

    fn text(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            content_type: TEXT,
            body: message.into().into_bytes(),
            attachment: None,
        }
    }

    fn attach(mut self, file_name: String) -> Self {
        self.attachment = Some(file_name);
        self
    }
}

pub struct Dashboard<O, T> {
    objects: O,
    table: T,
}

impl<O: ObjectStore, T: TableStore> Dashboard<O, T> {
    pub fn new(objects: O, table: T) -> Self {
        Self { objects, table }
    }

    pub fn handle(&self, method: &str, url: &str) -> Reply {
        if !method.eq_ignore_ascii_case("GET") {
            return Reply::text(405, "Method Not Allowed");
        }
        let (path, query) = query::split_url(url);
        match path {
            "/" => self.index(query.get("patient_id")),
            "/download_csv" => self.download_csv(query.get("patient_id")),
            "/download_image" => self.download_image(query.get("url"), query.get("patient_id")),
            _ => Reply::text(404, "Not Found"),
        }
    }

    fn index(&self, patient_id: Option<&str>) -> Reply {
        match self.table.select(patient_id) {
            Ok(rows) => Reply::ok(HTML, page::render_index(&rows, patient_id)),
            Err(err) => query_failed(err),
        }
    }

    fn download_csv(&self, patient_id: Option<&str>) -> Reply {
        let csv = self
            .table
            .select(patient_id)
            .and_then(|rows| page::render_csv(&rows));
        match csv {
            Ok(body) => Reply::ok(CSV, body).attach(page::csv_file_name(patient_id)),
            Err(err) => query_failed(err),
        }
    }

    fn download_image(&self, url: Option<&str>, patient_id: Option<&str>) -> Reply {
        let Some(url) = url else {
            return Reply::text(400, "Image URL missing");
        };
        match self.objects.fetch(url) {
            Ok(bytes) => {
                let name = format!("{}.png", patient_id.unwrap_or("ecg_graph"));
                Reply::ok(PNG, bytes).attach(name)
            }
            Err(err) => {
                log_warn!("Image download from {url} failed: {err:#}");
                Reply::text(500, format!("Failed to download image: {err:#}"))
            }
        }
    }
}

fn query_failed(err: anyhow::Error) -> Reply {
    log_error!("Patient data query failed: {err:#}");
    Reply::text(500, format!("Failed to load patient data: {err:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, PatientRecord, VitalsRecord};
    use crate::storage::publisher::fakes::{MemoryObjects, MemoryTable};
    use chrono::{TimeZone, Utc};

    fn seeded() -> Dashboard<MemoryObjects, MemoryTable> {
        let table = MemoryTable::acknowledging();
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 14, 5, 9).unwrap();
        for (id, name) in [("P-1", "Ada"), ("P-2", "Grace")] {
            let patient = Patient {
                id: id.into(),
                name: name.into(),
            };
            let vitals = VitalsRecord {
                pulse: Some(70),
                ..VitalsRecord::new()
            };
            let record = PatientRecord::new(
                &patient,
                &vitals,
                Some(format!("https://store.test/ecg-images/{id}.png")),
                at,
            );
            table.insert(&record).unwrap();
        }
        let objects = MemoryObjects::default();
        objects
            .upload("P-1.png", b"\x89PNG-bytes", "image/png")
            .unwrap();
        Dashboard::new(objects, table)
    }

    fn body(reply: &Reply) -> String {
        String::from_utf8(reply.body.clone()).unwrap()
    }

    #[test]
    fn index_lists_all_rows_without_filter() {
        let reply = seeded().handle("GET", "/");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, HTML);
        let html = body(&reply);
        assert!(html.contains("Ada") && html.contains("Grace"));
        assert!(html.contains("2024-05-02 14:05:09"));
    }

    #[test]
    fn index_filters_by_patient_id() {
        let html = body(&seeded().handle("GET", "/?patient_id=P-2"));
        assert!(html.contains("Grace"));
        assert!(!html.contains("Ada"));
    }

    #[test]
    fn csv_download_is_an_attachment() {
        let reply = seeded().handle("GET", "/download_csv?patient_id=P-1");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, CSV);
        assert_eq!(reply.attachment.as_deref(), Some("patient_data_P-1.csv"));
        let csv = body(&reply);
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("P-1,Ada,,,70,,https://store.test/ecg-images/P-1.png,2024-05-02 14:05:09"));

        let all = seeded().handle("GET", "/download_csv?patient_id=");
        assert_eq!(all.attachment.as_deref(), Some("patient_data_all.csv"));
        assert_eq!(body(&all).lines().count(), 3);
    }

    #[test]
    fn image_download_proxies_bytes() {
        let reply = seeded().handle(
            "GET",
            "/download_image?url=https%3A%2F%2Fstore.test%2Fecg-images%2FP-1.png&patient_id=P-1",
        );
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, PNG);
        assert_eq!(reply.body, b"\x89PNG-bytes");
        assert_eq!(reply.attachment.as_deref(), Some("P-1.png"));
    }

    #[test]
    fn image_download_defaults_file_name() {
        let reply = seeded().handle(
            "GET",
            "/download_image?url=https://store.test/ecg-images/P-1.png",
        );
        assert_eq!(reply.attachment.as_deref(), Some("ecg_graph.png"));
    }

    #[test]
    fn image_download_errors() {
        let dashboard = seeded();

        let missing = dashboard.handle("GET", "/download_image?patient_id=P-1");
        assert_eq!(missing.status, 400);
        assert_eq!(body(&missing), "Image URL missing");

        let failed = dashboard.handle("GET", "/download_image?url=https://elsewhere/x.png");
        assert_eq!(failed.status, 500);
        assert!(body(&failed).starts_with("Failed to download image: "));
    }

    #[test]
    fn unknown_routes_and_methods() {
        let dashboard = seeded();
        assert_eq!(dashboard.handle("GET", "/admin").status, 404);
        assert_eq!(dashboard.handle("POST", "/").status, 405);
    }

    #[test]
    fn failing_table_is_a_server_error() {
        struct BrokenTable;
        impl TableStore for BrokenTable {
            fn insert(&self, _: &PatientRecord) -> anyhow::Result<Vec<PatientRecord>> {
                anyhow::bail!("offline")
            }
            fn select(&self, _: Option<&str>) -> anyhow::Result<Vec<PatientRecord>> {
                anyhow::bail!("offline")
            }
        }

        let dashboard = Dashboard::new(MemoryObjects::default(), BrokenTable);
        let reply = dashboard.handle("GET", "/download_csv");
        assert_eq!(reply.status, 500);
        assert!(body(&reply).contains("offline"));
    }
}
