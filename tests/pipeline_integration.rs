/// Integration tests for a full pipeline run
///
/// These tests verify:
/// 1. Monthly CSV → weekly CSV in both output scales
/// 2. Byte-identical output across repeated runs
/// 3. Fatal input errors leave no output file behind
/// 4. Batched upload through a `BatchSink`, including partial failure
///    and a sink that cannot be opened
/// 5. The JSON validation report, and output files replaced whole or not at all
///
/// Everything runs against scratch files; no network or database needed.
/// Live backend checks live next to the sinks and are #[ignore]d.

use std::fs;
use std::path::{Path, PathBuf};

use weekly_demand_service::config::Config;
use weekly_demand_service::model::{DemandError, DemandScale, WeeklyRecord};
use weekly_demand_service::pipeline::{self, PipelineError};
use weekly_demand_service::sink::{BatchSink, SinkError, UploadError};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const SEASONAL: [f64; 12] = [
    40.0, 55.0, 90.0, 130.0, 180.0, 210.0, 260.0, 240.0, 170.0, 120.0, 70.0, 45.0,
];

fn monthly_csv(crops: &[(i64, [f64; 12])]) -> String {
    let mut csv = String::from("crop_id,month_no,demand\n");
    for (crop_id, months) in crops {
        for (i, demand) in months.iter().enumerate() {
            csv.push_str(&format!("{},{},{}\n", crop_id, i + 1, demand));
        }
    }
    csv
}

fn setup(dir: &Path, csv: &str, scale: DemandScale) -> Config {
    let input = dir.join("monthly.csv");
    fs::write(&input, csv).unwrap();

    let mut config = Config::default();
    config.input.path = input;
    config.output.csv_path = dir.join("weekly.csv");
    config.output.scale = scale;
    config
}

fn data_lines(path: &PathBuf) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(|l| l.split(',').map(String::from).collect())
        .collect()
}

/// Sink that keeps rows in memory and fails the listed batch indexes.
struct MemorySink {
    fail_on: Vec<usize>,
    calls: usize,
    rows: Vec<WeeklyRecord>,
}

impl MemorySink {
    fn new(fail_on: Vec<usize>) -> Self {
        Self { fail_on, calls: 0, rows: Vec::new() }
    }
}

impl BatchSink for MemorySink {
    fn insert_batch(&mut self, _table: &str, rows: &[WeeklyRecord]) -> Result<(), SinkError> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on.contains(&call) {
            return Err(SinkError::Transport("connection reset".to_string()));
        }
        self.rows.extend_from_slice(rows);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Raw Scale
// ---------------------------------------------------------------------------

#[test]
fn test_raw_run_writes_expected_weekly_csv() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), &monthly_csv(&[(1, [100.0; 12])]), DemandScale::Raw);

    let summary = pipeline::run_with_sink(&config, None).unwrap();
    assert_eq!(summary.monthly_rows, 12);
    assert_eq!(summary.crops, 1);
    assert!(summary.upload.is_none());

    let contents = fs::read_to_string(&config.output.csv_path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("id,crop_id,week_no,demand"));
    // January: 25 * [0.97, 0.99, 1.01, 1.03]
    assert_eq!(lines.next(), Some("1,1,1,24"));
    assert_eq!(lines.next(), Some("2,1,2,25"));
    assert_eq!(lines.next(), Some("3,1,3,25"));
    assert_eq!(lines.next(), Some("4,1,4,26"));

    // March is a five-week month: weeks 9-13
    let rows = data_lines(&config.output.csv_path);
    let march: Vec<&str> = rows[8..13].iter().map(|r| r[3].as_str()).collect();
    assert_eq!(march, vec!["19", "20", "20", "20", "21"]);
    assert_eq!(rows.len(), 52);
}

#[test]
fn test_every_crop_has_weeks_one_through_fifty_two_once() {
    let dir = tempfile::tempdir().unwrap();
    let csv = monthly_csv(&[(7, SEASONAL), (2, [12.0; 12]), (30, [0.0; 12])]);
    let config = setup(dir.path(), &csv, DemandScale::Raw);

    pipeline::run_with_sink(&config, None).unwrap();
    let rows = data_lines(&config.output.csv_path);
    assert_eq!(rows.len(), 3 * 52);

    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row[0], (i + 1).to_string(), "ids must be sequential");
    }
    for (block, crop_id) in [2, 7, 30].iter().enumerate() {
        let weeks: Vec<u32> = rows[block * 52..(block + 1) * 52]
            .iter()
            .map(|r| {
                assert_eq!(r[1], crop_id.to_string());
                r[2].parse().unwrap()
            })
            .collect();
        assert_eq!(weeks, (1..=52).collect::<Vec<_>>());
    }
}

#[test]
fn test_raw_validation_stays_within_rounding_bound() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), &monthly_csv(&[(1, SEASONAL)]), DemandScale::Raw);

    let summary = pipeline::run_with_sink(&config, None).unwrap();
    match summary.validation.check {
        weekly_demand_service::verify::ValidationCheck::MassConservation(report) => {
            assert_eq!(report.rows.len(), 12);
            assert!(report.summary.max_abs_difference <= 2.5);
        }
        other => panic!("expected mass conservation check, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Percentage Scale
// ---------------------------------------------------------------------------

#[test]
fn test_percentage_run_peaks_at_100_for_every_crop() {
    let dir = tempfile::tempdir().unwrap();
    let csv = monthly_csv(&[(1, SEASONAL), (2, [100.0; 12]), (3, [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 9.0])]);
    let config = setup(dir.path(), &csv, DemandScale::Percentage);

    let summary = pipeline::run_with_sink(&config, None).unwrap();
    assert!(summary.validation.is_clean());

    let rows = data_lines(&config.output.csv_path);
    for crop_id in ["1", "2", "3"] {
        let values: Vec<f64> = rows
            .iter()
            .filter(|r| r[1] == crop_id)
            .map(|r| r[3].parse().unwrap())
            .collect();
        assert_eq!(values.len(), 52);
        assert_eq!(values.iter().cloned().fold(f64::MIN, f64::max), 100.0);
        assert!(values.iter().all(|v| (0.0..=100.0).contains(v)));
    }
    assert!(rows.iter().all(|r| r[3].split('.').nth(1).map(str::len) == Some(2)));
}

#[test]
fn test_all_zero_crop_aborts_percentage_run_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let csv = monthly_csv(&[(1, SEASONAL), (4, [0.0; 12])]);
    let config = setup(dir.path(), &csv, DemandScale::Percentage);

    let err = pipeline::run_with_sink(&config, None).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Demand(DemandError::DegenerateCrop { crop_id: 4, .. })
    ));
    assert!(!config.output.csv_path.exists());
}

// ---------------------------------------------------------------------------
// Determinism and Input Errors
// ---------------------------------------------------------------------------

#[test]
fn test_repeated_runs_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let csv = monthly_csv(&[(5, SEASONAL), (1, [33.0; 12]), (3, SEASONAL)]);

    for scale in [DemandScale::Raw, DemandScale::Percentage] {
        let config = setup(dir.path(), &csv, scale);
        pipeline::run_with_sink(&config, None).unwrap();
        let first = fs::read(&config.output.csv_path).unwrap();
        pipeline::run_with_sink(&config, None).unwrap();
        let second = fs::read(&config.output.csv_path).unwrap();
        assert_eq!(first, second, "{} output changed between runs", scale);
    }
}

#[test]
fn test_missing_month_aborts_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut csv = monthly_csv(&[(1, SEASONAL)]);
    csv = csv.replace("1,6,210\n", "");
    let config = setup(dir.path(), &csv, DemandScale::Raw);

    let err = pipeline::run_with_sink(&config, None).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Demand(DemandError::MissingMonth { crop_id: 1, month_no: 6 })
    ));
    assert!(!config.output.csv_path.exists());
}

#[test]
fn test_negative_demand_aborts_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let csv = monthly_csv(&[(1, SEASONAL)]).replace("1,3,90\n", "1,3,-90\n");
    let config = setup(dir.path(), &csv, DemandScale::Raw);

    let err = pipeline::run_with_sink(&config, None).unwrap_err();
    assert!(matches!(err, PipelineError::Ingest(_)));
    assert!(err.to_string().contains("invalid demand"));
}

#[test]
fn test_missing_input_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.input.path = dir.path().join("absent.csv");
    config.output.csv_path = dir.path().join("weekly.csv");

    let err = pipeline::run_with_sink(&config, None).unwrap_err();
    assert!(matches!(err, PipelineError::Ingest(_)));
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[test]
fn test_upload_sends_every_row_in_batches() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path(), &monthly_csv(&[(1, SEASONAL), (2, SEASONAL)]), DemandScale::Raw);
    config.upload.batch_size = 25;

    let mut sink = MemorySink::new(vec![]);
    let summary = pipeline::run_with_sink(&config, Some(&mut sink)).unwrap();

    let report = summary.upload.as_ref().unwrap().as_ref().unwrap();
    assert_eq!(report.total_batches, 5); // 104 rows / 25
    assert_eq!(report.uploaded_records, 104);
    assert_eq!(sink.rows, summary.weekly);
    assert!(summary.upload_succeeded());
}

#[test]
fn test_failed_batch_is_reported_and_csv_is_still_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), &monthly_csv(&[(1, SEASONAL), (2, SEASONAL)]), DemandScale::Raw);

    let mut sink = MemorySink::new(vec![0]);
    let summary = pipeline::run_with_sink(&config, Some(&mut sink)).unwrap();

    assert!(!summary.upload_succeeded());
    match summary.upload {
        Some(Err(UploadError::BatchesFailed { report })) => {
            assert_eq!(report.total_batches, 2);
            assert_eq!(report.failures.len(), 1);
            assert_eq!(report.failures[0].batch_index, 0);
            assert_eq!(report.failures[0].first_id, 1);
            assert_eq!(report.uploaded_records, 4);
        }
        other => panic!("expected a batch failure, got {:?}", other),
    }
    assert_eq!(sink.calls, 2);
    assert_eq!(sink.rows.len(), 4);
    assert!(config.output.csv_path.exists());
}

#[test]
fn test_unopenable_sink_is_reported_after_csv_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), &monthly_csv(&[(1, SEASONAL)]), DemandScale::Raw);

    let open = || -> Result<Box<dyn BatchSink>, UploadError> {
        Err(UploadError::Client("database connection failed: connection refused".to_string()))
    };
    let summary = pipeline::run_with_opener(&config, Some(open)).unwrap();

    assert!(!summary.upload_succeeded());
    assert!(matches!(summary.upload, Some(Err(UploadError::Client(_)))));
    assert_eq!(data_lines(&config.output.csv_path).len(), 52);
}

#[test]
fn test_sink_is_opened_only_after_input_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let csv = monthly_csv(&[(1, SEASONAL)]).replace("1,3,90\n", "1,3,-90\n");
    let config = setup(dir.path(), &csv, DemandScale::Raw);

    let mut opened = false;
    let open = || -> Result<Box<dyn BatchSink>, UploadError> {
        opened = true;
        Ok(Box::new(MemorySink::new(vec![])))
    };
    let err = pipeline::run_with_opener(&config, Some(open)).unwrap_err();

    assert!(matches!(err, PipelineError::Ingest(_)));
    assert!(!opened);
}

#[test]
fn test_opened_sink_receives_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), &monthly_csv(&[(1, SEASONAL), (2, SEASONAL)]), DemandScale::Raw);

    let open = || -> Result<Box<dyn BatchSink>, UploadError> { Ok(Box::new(MemorySink::new(vec![]))) };
    let summary = pipeline::run_with_opener(&config, Some(open)).unwrap();

    let report = summary.upload.as_ref().unwrap().as_ref().unwrap();
    assert_eq!(report.uploaded_records, 104);
    assert!(report.is_complete());
}

// ---------------------------------------------------------------------------
// Validation Report
// ---------------------------------------------------------------------------

#[test]
fn test_report_json_is_written_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path(), &monthly_csv(&[(1, [0.0; 12])]), DemandScale::Raw);
    let report_path = dir.path().join("report.json");
    config.output.report_path = Some(report_path.clone());

    pipeline::run_with_sink(&config, None).unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["scale"], "raw");
    assert_eq!(json["check"]["kind"], "mass_conservation");
    assert_eq!(json["check"]["summary"]["undefined_percent_rows"], 12);
    assert!(json["check"]["rows"][0]["difference_percent"].is_null());
}

#[test]
fn test_report_failure_leaves_previous_csv_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path(), &monthly_csv(&[(1, SEASONAL)]), DemandScale::Raw);
    config.output.report_path = Some(dir.path().join("missing").join("report.json"));
    fs::write(&config.output.csv_path, "previous run\n").unwrap();

    let err = pipeline::run_with_sink(&config, None).unwrap_err();

    assert!(matches!(err, PipelineError::Output(_)));
    assert_eq!(fs::read_to_string(&config.output.csv_path).unwrap(), "previous run\n");
}
