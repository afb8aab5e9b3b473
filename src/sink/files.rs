/// Local file output: the weekly CSV and the JSON validation report.
///
/// Both files are written to a temporary file next to the target and renamed
/// into place, so readers see either the previous file or the complete new
/// one.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::model::{DemandScale, WeeklyRecord};
use crate::verify::ValidationReport;

pub const CSV_HEADER: [&str; 4] = ["id", "crop_id", "week_no", "demand"];

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to create {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to replace {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("report serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Formats a demand value for the CSV column.
///
/// Raw demand is a whole number; percentage demand keeps two decimals.
pub fn format_demand(demand: f64, scale: DemandScale) -> String {
    match scale {
        DemandScale::Raw => format!("{:.0}", demand),
        DemandScale::Percentage => format!("{:.2}", demand),
    }
}

/// Writes `id,crop_id,week_no,demand` rows in the order given.
pub fn write_weekly<W: Write>(writer: W, records: &[WeeklyRecord], scale: DemandScale) -> Result<(), OutputError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;

    for record in records {
        csv_writer.write_record(&[
            record.id.to_string(),
            record.crop_id.to_string(),
            record.week_no.to_string(),
            format_demand(record.demand, scale),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes the weekly CSV to `path`, replacing any existing file.
pub fn write_weekly_csv(path: &Path, records: &[WeeklyRecord], scale: DemandScale) -> Result<(), OutputError> {
    write_atomically(path, |file| write_weekly(BufWriter::new(file), records, scale))
}

/// Writes the validation report to `path` as pretty-printed JSON.
pub fn write_report_json(path: &Path, report: &ValidationReport) -> Result<(), OutputError> {
    write_atomically(path, |file| {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    })
}

/// Runs `write` against a temp file in `path`'s directory, then renames it
/// over `path`. On error the temp file is removed and `path` is untouched.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<(), OutputError>
where
    F: FnOnce(&mut File) -> Result<(), OutputError>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|source| OutputError::Create {
        path: path.display().to_string(),
        source,
    })?;

    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| OutputError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}
