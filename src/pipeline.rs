//! One run of the service: Load → Redistribute → (Normalize) → Validate → Persist.
//!
//! Stages before Persist are all-or-nothing: the first error aborts the run
//! and no output file is touched. Validation findings are logged and
//! returned, never fatal. Upload failures (connecting or any batch) are
//! returned in the summary after the CSV has been written.

use std::collections::BTreeSet;
use thiserror::Error;

use crate::analysis;
use crate::config::Config;
use crate::ingest::monthly_csv::{self, IngestError};
use crate::logging::{self, Stage};
use crate::model::{DemandError, WeeklyRecord};
use crate::sink::files::{self, OutputError};
use crate::sink::{BatchSink, SinkTarget, UploadError, UploadReport, upload_in_batches};
use crate::verify::{self, ValidationCheck, ValidationReport};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("loading monthly demand failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("redistribution failed: {0}")]
    Demand(#[from] DemandError),

    #[error("writing output failed: {0}")]
    Output(#[from] OutputError),

    #[error("upload setup failed: {0}")]
    Upload(#[from] UploadError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Ingest(_) => Stage::Load,
            PipelineError::Demand(_) => Stage::Redistribute,
            PipelineError::Output(_) => Stage::Output,
            PipelineError::Upload(_) => Stage::Upload,
        }
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub monthly_rows: usize,
    pub crops: usize,
    pub weekly: Vec<WeeklyRecord>,
    pub validation: ValidationReport,
    /// `None` when upload is disabled.
    pub upload: Option<Result<UploadReport, UploadError>>,
}

impl RunSummary {
    /// False if any upload batch failed.
    pub fn upload_succeeded(&self) -> bool {
        !matches!(self.upload, Some(Err(_)))
    }
}

/// Runs the pipeline, uploading through the configured backend when upload
/// is enabled.
///
/// Missing credentials abort before any work is done. The backend itself is
/// only connected after the local output is written; a failed connection is
/// reported in `RunSummary::upload` like a failed batch.
pub fn run(config: &Config) -> Result<RunSummary, PipelineError> {
    let target = if config.upload.enabled {
        match SinkTarget::resolve(config.upload.backend, |key| std::env::var(key).ok()) {
            Ok(target) => Some(target),
            Err(e) => {
                logging::log_stage_failure(Stage::Upload, &e);
                return Err(e.into());
            }
        }
    } else {
        None
    };

    let timeout = config.upload.timeout();
    let scale = config.output.scale;
    run_with_opener(config, target.map(|target| move || target.connect(timeout, scale)))
}

/// Runs the pipeline, calling `open` for a sink once the local output is
/// written. `None` skips the upload.
pub fn run_with_opener<O>(config: &Config, open: Option<O>) -> Result<RunSummary, PipelineError>
where
    O: FnOnce() -> Result<Box<dyn BatchSink>, UploadError>,
{
    let upload = open.map(|open| {
        move |weekly: &[WeeklyRecord]| -> Result<UploadReport, UploadError> {
            let mut sink = open().inspect_err(|e| {
                logging::error(Stage::Upload, None, &format!("could not open upload sink: {}", e))
            })?;
            upload_to(sink.as_mut(), config, weekly)
        }
    });
    finish(execute(config, upload))
}

/// Runs the pipeline against an already opened sink (or none).
///
/// `config.upload.enabled` is not consulted here; passing a sink is what
/// turns upload on.
pub fn run_with_sink(config: &Config, sink: Option<&mut dyn BatchSink>) -> Result<RunSummary, PipelineError> {
    let upload = sink.map(|sink| move |weekly: &[WeeklyRecord]| upload_to(sink, config, weekly));
    finish(execute(config, upload))
}

fn finish(result: Result<RunSummary, PipelineError>) -> Result<RunSummary, PipelineError> {
    if let Err(ref e) = result {
        logging::log_stage_failure(e.stage(), e);
    }
    result
}

fn upload_to(sink: &mut dyn BatchSink, config: &Config, weekly: &[WeeklyRecord]) -> Result<UploadReport, UploadError> {
    logging::info(
        Stage::Upload,
        None,
        &format!(
            "Uploading {} rows to '{}' in batches of {}",
            weekly.len(),
            config.upload.table,
            config.upload.batch_size
        ),
    );
    upload_in_batches(sink, &config.upload.table, weekly, config.upload.batch_size)
}

fn execute<U>(config: &Config, upload: Option<U>) -> Result<RunSummary, PipelineError>
where
    U: FnOnce(&[WeeklyRecord]) -> Result<UploadReport, UploadError>,
{
    // Load
    let input = &config.input.path;
    logging::info(Stage::Load, None, &format!("Reading monthly demand from {}", input.display()));
    let monthly = monthly_csv::load_monthly_csv(input)?;
    let crops: BTreeSet<i64> = monthly.iter().map(|m| m.crop_id).collect();
    logging::info(
        Stage::Load,
        None,
        &format!("Loaded {} rows for {} crops", monthly.len(), crops.len()),
    );

    // Redistribute (+ normalize)
    let scale = config.output.scale;
    let amplitude = config.redistribution.amplitude;
    logging::debug(
        Stage::Redistribute,
        None,
        &format!("amplitude {}, scale {}", amplitude, scale),
    );
    let weekly = analysis::build_weekly_dataset(&monthly, amplitude, scale)?;
    logging::info(
        Stage::Redistribute,
        None,
        &format!("Generated {} weekly rows ({} demand)", weekly.len(), scale),
    );

    // Validate
    let validation = verify::validate(&monthly, &weekly, scale);
    log_validation(&validation);

    // Persist: the report goes first so a failure there leaves the previous
    // weekly CSV untouched.
    if let Some(report_path) = &config.output.report_path {
        files::write_report_json(report_path, &validation)?;
        logging::info(
            Stage::Output,
            None,
            &format!("Validation report saved to {}", report_path.display()),
        );
    }
    files::write_weekly_csv(&config.output.csv_path, &weekly, scale)?;
    logging::info(
        Stage::Output,
        None,
        &format!("Weekly demand saved to {}", config.output.csv_path.display()),
    );

    let upload = upload.map(|upload| upload(&weekly));

    Ok(RunSummary {
        monthly_rows: monthly.len(),
        crops: crops.len(),
        weekly,
        validation,
        upload,
    })
}

fn log_validation(report: &ValidationReport) {
    match &report.check {
        ValidationCheck::MassConservation(r) => {
            let s = &r.summary;
            let percent = s
                .mean_abs_difference_percent
                .map(|p| format!("{:.2}%", p))
                .unwrap_or_else(|| "n/a".to_string());
            logging::info(
                Stage::Validate,
                None,
                &format!(
                    "Average absolute difference: {:.2}, average percentage difference: {}",
                    s.mean_abs_difference, percent
                ),
            );
            for row in r.rows.iter().filter(|row| row.difference != 0.0) {
                logging::debug(
                    Stage::Validate,
                    Some(&format!("crop {}", row.crop_id)),
                    &format!(
                        "month {}: monthly {} vs weekly sum {} (difference {})",
                        row.month_no, row.monthly_demand, row.weekly_sum, row.difference
                    ),
                );
            }
            if s.undefined_percent_rows > 0 {
                logging::warn(
                    Stage::Validate,
                    None,
                    &format!(
                        "{} month(s) have zero monthly demand; percentage difference undefined",
                        s.undefined_percent_rows
                    ),
                );
            }
        }
        ValidationCheck::Normalization(r) => {
            for crop in r.crops.iter().filter(|c| !c.reaches_100) {
                logging::warn(
                    Stage::Validate,
                    Some(&format!("crop {}", crop.crop_id)),
                    &format!("maximum weekly demand is {}, expected 100", crop.max_weekly_demand),
                );
            }
            logging::info(
                Stage::Validate,
                None,
                &format!(
                    "{}/{} crops peak at 100, {} weeks at 100",
                    r.crops.len() - r.violations.len(),
                    r.crops.len(),
                    r.weeks_at_100
                ),
            );
        }
    }
}
