//! Persistence for the weekly dataset.
//!
//! - `files` — weekly CSV and JSON validation report on local disk
//! - `upload` — batching driver over any `BatchSink`
//! - `rest` — PostgREST-style HTTP endpoint (Supabase)
//! - `database` — direct Postgres connection
//!
//! Credentials are read from the environment only: `SUPABASE_URL` and
//! `SUPABASE_KEY` for the REST backend, `DATABASE_URL` for Postgres.

pub mod database;
pub mod files;
pub mod rest;
pub mod upload;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::model::{DemandScale, WeeklyRecord};

pub use upload::{BatchUploadError, UploadError, UploadReport, upload_in_batches};

// ---------------------------------------------------------------------------
// Sink abstraction
// ---------------------------------------------------------------------------

/// A remote table that accepts weekly records in batches.
///
/// One call is one unit of work: it either stores every row of the batch or
/// reports why it did not.
pub trait BatchSink {
    fn insert_batch(&mut self, table: &str, rows: &[WeeklyRecord]) -> Result<(), SinkError>;
}

/// Why a single batch was not stored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SinkError {
    /// Non-2xx response from the REST endpoint.
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never got a response (connect failure, timeout, ...).
    #[error("request failed: {0}")]
    Transport(String),

    /// The database rejected the insert.
    #[error("database error: {0}")]
    Database(String),

    /// Table names are interpolated into SQL, so only identifiers are allowed.
    #[error("invalid table name '{0}'")]
    InvalidTable(String),
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadBackend {
    #[default]
    Rest,
    Postgres,
}

/// A backend whose credentials have been read but which is not connected yet.
///
/// Resolving credentials is cheap and happens before any data is loaded, so
/// a misconfigured upload fails the run early. Connecting happens only once
/// the local output is on disk.
#[derive(Debug, Clone)]
pub enum SinkTarget {
    Rest(rest::RestCredentials),
    Postgres { database_url: String },
}

impl SinkTarget {
    /// Reads the credentials `backend` needs through `lookup`.
    ///
    /// `lookup` is normally `|key| std::env::var(key).ok()`; passing it in keeps
    /// credential handling testable without touching the process environment.
    pub fn resolve(backend: UploadBackend, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, UploadError> {
        match backend {
            UploadBackend::Rest => Ok(SinkTarget::Rest(rest::RestCredentials::from_lookup(&lookup)?)),
            UploadBackend::Postgres => Ok(SinkTarget::Postgres {
                database_url: required_credential(&lookup, database::DATABASE_URL_VAR)?,
            }),
        }
    }

    /// Builds the HTTP client or opens the database connection.
    pub fn connect(self, timeout: Duration, scale: DemandScale) -> Result<Box<dyn BatchSink>, UploadError> {
        match self {
            SinkTarget::Rest(credentials) => Ok(Box::new(rest::RestSink::new(credentials, timeout, scale)?)),
            SinkTarget::Postgres { database_url } => Ok(Box::new(database::PostgresSink::connect(&database_url)?)),
        }
    }
}

/// Reads a non-empty credential or fails with `MissingCredentials`.
pub(crate) fn required_credential(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, UploadError> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(UploadError::MissingCredentials(key))
}
