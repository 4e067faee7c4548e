//! Supabase REST client for the chart bucket and the patient table.

use std::io::Read;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ureq::{Agent, AgentBuilder, Request};

use crate::models::PatientRecord;
use crate::settings::StorageSettings;

use super::{ObjectStore, TableStore};

/// Upper bound on images proxied through the dashboard.
const MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct SupabaseStore {
    agent: Agent,
    base_url: String,
    api_key: String,
    bucket: String,
    table: String,
}

impl SupabaseStore {
    pub fn new(settings: &StorageSettings) -> Result<Self> {
        settings.ensure_configured()?;

        let agent = AgentBuilder::new()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build();

        Ok(Self {
            agent,
            base_url: settings.url.trim().trim_end_matches('/').to_string(),
            api_key: settings.key.trim().to_string(),
            bucket: settings.bucket.clone(),
            table: settings.table.clone(),
        })
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: Request) -> Request {
        request
            .set("apikey", &self.api_key)
            .set("Authorization", &format!("Bearer {}", self.api_key))
    }
}

impl ObjectStore for SupabaseStore {
    fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key);
        self.authorized(self.agent.post(&url))
            .set("Content-Type", content_type)
            .send_bytes(bytes)
            .map_err(request_error)
            .with_context(|| format!("upload of {key} to bucket {} failed", self.bucket))?;
        Ok(self.public_url(key))
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.agent.get(url).call().map_err(request_error)?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_IMAGE_BYTES)
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read body of {url}"))?;
        Ok(bytes)
    }
}

impl TableStore for SupabaseStore {
    fn insert(&self, record: &PatientRecord) -> Result<Vec<PatientRecord>> {
        let response = self
            .authorized(self.agent.post(&self.table_url()))
            .set("Prefer", "return=representation")
            .send_json(record)
            .map_err(request_error)
            .with_context(|| format!("insert into {} failed", self.table))?;
        let body = response
            .into_string()
            .context("failed to read insert response")?;
        parse_rows(&body)
    }

    fn select(&self, patient_id: Option<&str>) -> Result<Vec<PatientRecord>> {
        let mut request = self
            .authorized(self.agent.get(&self.table_url()))
            .query("select", "*");
        if let Some(id) = patient_id.map(str::trim).filter(|id| !id.is_empty()) {
            request = request.query("patient_id", &format!("eq.{id}"));
        }
        let body = request
            .call()
            .map_err(request_error)
            .with_context(|| format!("select from {} failed", self.table))?
            .into_string()
            .context("failed to read select response")?;
        parse_rows(&body)
    }
}

fn parse_rows(body: &str) -> Result<Vec<PatientRecord>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(body).with_context(|| format!("unexpected table response: {body}"))
}

fn request_error(err: ureq::Error) -> anyhow::Error {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            anyhow!("HTTP {code}: {body}")
        }
        other => anyhow::Error::new(other),
    }
}
