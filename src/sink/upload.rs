//! Batched upload of the weekly dataset.
//!
//! Records are split into fixed-size batches and handed to a `BatchSink`
//! one batch at a time. A failed batch is recorded with its index and the
//! remaining batches still run. Nothing is retried here; rerunning is up to
//! the caller.

use serde::Serialize;
use thiserror::Error;

use super::{BatchSink, SinkError};
use crate::logging;
use crate::model::WeeklyRecord;

/// Records per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 100;

// ============================================================================
// Results
// ============================================================================

/// One batch that was not stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchUploadError {
    /// 0-based position of the batch.
    pub batch_index: usize,
    /// Id of the first record in the batch.
    pub first_id: u64,
    pub records: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    pub table: String,
    pub total_batches: usize,
    pub uploaded_batches: usize,
    pub uploaded_records: usize,
    pub failures: Vec<BatchUploadError>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(&'static str),

    #[error("could not initialize upload client: {0}")]
    Client(String),

    #[error("{} of {} batches failed to upload", .report.failures.len(), .report.total_batches)]
    BatchesFailed { report: UploadReport },
}

// ============================================================================
// Upload Driver
// ============================================================================

/// Uploads `records` to `table` in batches of `batch_size`.
///
/// Returns the report when every batch succeeded, and
/// `UploadError::BatchesFailed` carrying the same report otherwise.
/// A `batch_size` of zero is treated as one.
pub fn upload_in_batches(
    sink: &mut dyn BatchSink,
    table: &str,
    records: &[WeeklyRecord],
    batch_size: usize,
) -> Result<UploadReport, UploadError> {
    let mut report = UploadReport {
        table: table.to_string(),
        total_batches: 0,
        uploaded_batches: 0,
        uploaded_records: 0,
        failures: Vec::new(),
    };

    for (batch_index, batch) in records.chunks(batch_size.max(1)).enumerate() {
        report.total_batches += 1;

        match sink.insert_batch(table, batch) {
            Ok(()) => {
                report.uploaded_batches += 1;
                report.uploaded_records += batch.len();
                logging::debug(
                    logging::Stage::Upload,
                    Some(&format!("batch {}", batch_index)),
                    &format!("stored {} records", batch.len()),
                );
            }
            Err(err) => {
                logging::log_batch_failure(batch_index, &err);
                report.failures.push(batch_failure(batch_index, batch, &err));
            }
        }
    }

    logging::log_upload_summary(
        report.total_batches,
        report.uploaded_batches,
        report.failures.len(),
    );

    if report.is_complete() {
        Ok(report)
    } else {
        Err(UploadError::BatchesFailed { report })
    }
}

fn batch_failure(batch_index: usize, batch: &[WeeklyRecord], err: &SinkError) -> BatchUploadError {
    BatchUploadError {
        batch_index,
        first_id: batch.first().map(|r| r.id).unwrap_or_default(),
        records: batch.len(),
        message: err.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
