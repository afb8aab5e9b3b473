/// REST upload client
///
/// Inserts weekly records through a PostgREST-compatible endpoint, as
/// exposed by Supabase. Each batch is one POST of a JSON array to
/// `{base_url}/rest/v1/{table}`, authenticated with the project key.
///
/// Credentials come from the environment (`SUPABASE_URL`, `SUPABASE_KEY`),
/// never from config files.

use serde_json::{Value, json};
use std::time::Duration;

use super::upload::UploadError;
use super::{BatchSink, SinkError, required_credential};
use crate::model::{DemandScale, WeeklyRecord};

pub const SUPABASE_URL_VAR: &str = "SUPABASE_URL";
pub const SUPABASE_KEY_VAR: &str = "SUPABASE_KEY";

// ============================================================================
// Credentials
// ============================================================================

#[derive(Clone)]
pub struct RestCredentials {
    pub base_url: String,
    pub api_key: String,
}

// Keep the key out of logs and panic messages.
impl std::fmt::Debug for RestCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestCredentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl RestCredentials {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, UploadError> {
        Ok(Self {
            base_url: required_credential(lookup, SUPABASE_URL_VAR)?,
            api_key: required_credential(lookup, SUPABASE_KEY_VAR)?,
        })
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct RestSink {
    client: reqwest::blocking::Client,
    credentials: RestCredentials,
    scale: DemandScale,
}

impl RestSink {
    pub fn new(credentials: RestCredentials, timeout: Duration, scale: DemandScale) -> Result<Self, UploadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Client(e.to_string()))?;

        Ok(Self {
            client,
            credentials,
            scale,
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        build_table_url(&self.credentials.base_url, table)
    }
}

impl BatchSink for RestSink {
    fn insert_batch(&mut self, table: &str, rows: &[WeeklyRecord]) -> Result<(), SinkError> {
        let body: Vec<Value> = rows.iter().map(|r| record_to_json(r, self.scale)).collect();

        let response = self
            .client
            .post(self.table_url(table))
            .header("apikey", &self.credentials.api_key)
            .header("Authorization", format!("Bearer {}", self.credentials.api_key))
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Http {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Payload Helpers
// ============================================================================

/// `{base_url}/rest/v1/{table}`, tolerating a trailing slash on the base.
pub fn build_table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table)
}

/// Serializes one record as a key-value row.
///
/// Raw demand goes out as an integer, percentage demand as a float.
pub fn record_to_json(record: &WeeklyRecord, scale: DemandScale) -> Value {
    let demand = match scale {
        DemandScale::Raw => json!(record.demand as i64),
        DemandScale::Percentage => json!(record.demand),
    };

    json!({
        "id": record.id,
        "crop_id": record.crop_id,
        "week_no": record.week_no,
        "demand": demand,
    })
}

// ============================================================================
// Tests
// ============================================================================
