/// Monthly demand CSV loader
///
/// Reads the per-crop monthly demand table the pipeline starts from.
///
/// Expected columns (header names are trimmed, extra columns are ignored):
///   crop_id   integer crop identifier
///   month_no  integer 1-12
///   demand    non-negative number
///
/// Row shape is checked here; dataset rules (one row per crop/month, all
/// twelve months present) are checked by `analysis::groupings`.

use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::model::{DemandError, MonthlyRecord};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    /// `row` is the 1-based data row, not counting the header.
    #[error("row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Demand(#[from] DemandError),
}

// ============================================================================
// CSV Row
// ============================================================================

const REQUIRED_COLUMNS: [&str; 3] = ["crop_id", "month_no", "demand"];

#[derive(Debug, Deserialize)]
struct MonthlyRow {
    crop_id: i64,
    month_no: u32,
    demand: f64,
}

// ============================================================================
// Loader Functions
// ============================================================================

/// Load monthly records from a CSV file on disk.
pub fn load_monthly_csv(path: &Path) -> Result<Vec<MonthlyRecord>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })?;
    read_monthly_csv(file)
}

/// Load monthly records from any CSV reader.
///
/// Fails on the first malformed row, or a negative / non-finite demand.
pub fn read_monthly_csv<R: Read>(reader: R) -> Result<Vec<MonthlyRecord>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(IngestError::MissingColumn(column));
        }
    }

    let mut records = Vec::new();
    for (i, result) in reader.deserialize::<MonthlyRow>().enumerate() {
        let row = result.map_err(|e| IngestError::Parse {
            row: i + 1,
            message: e.to_string(),
        })?;

        if !row.demand.is_finite() || row.demand < 0.0 {
            return Err(DemandError::InvalidDemand {
                crop_id: row.crop_id,
                month_no: row.month_no,
                demand: row.demand,
            }
            .into());
        }

        records.push(MonthlyRecord {
            crop_id: row.crop_id,
            month_no: row.month_no,
            demand: row.demand,
        });
    }

    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================
