/// Structured logging for the weekly demand service
///
/// Provides context-rich logging with pipeline stage and crop/batch
/// identifiers, timestamps, and severity levels. Supports both console
/// output and file-based logging for scheduled runs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::sink::SinkError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Redistribute,
    Validate,
    Output,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Load => write!(f, "LOAD"),
            Stage::Redistribute => write!(f, "REDIST"),
            Stage::Validate => write!(f, "VALID"),
            Stage::Output => write!(f, "OUT"),
            Stage::Upload => write!(f, "UPLOAD"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - rows already present from an earlier upload
    Expected,
    /// Unexpected failure - indicates a configuration or schema problem
    Unexpected,
    /// Unknown - service-side or network trouble that may clear on a rerun
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        *LOGGER.lock().unwrap_or_else(|e| e.into_inner()) = Some(logger);
    }

    fn log(&self, level: LogLevel, stage: Stage, context: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, stage, context_part, message
        );

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, context_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, context_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

fn dispatch(level: LogLevel, stage: Stage, context: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
        logger.log(level, stage, context, message);
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

/// Log a general informational message
pub fn info(stage: Stage, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, stage, context, message);
}

/// Log a warning message
pub fn warn(stage: Stage, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, stage, context, message);
}

/// Log an error message
pub fn error(stage: Stage, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, stage, context, message);
}

/// Log a debug message
pub fn debug(stage: Stage, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, stage, context, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a failed upload batch by what went wrong
pub fn classify_upload_failure(err: &SinkError) -> FailureType {
    match err {
        // Duplicate ids: the batch was most likely uploaded by an earlier run
        SinkError::Http { status: 409, .. } => FailureType::Expected,
        SinkError::Database(msg) if msg.contains("duplicate key") => FailureType::Expected,
        // Bad key, missing table, rejected payload
        SinkError::Http { status, .. } if (400..500).contains(status) => FailureType::Unexpected,
        SinkError::InvalidTable(_) => FailureType::Unexpected,
        _ => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failed upload batch with automatic classification
pub fn log_batch_failure(batch_index: usize, err: &SinkError) {
    let failure_type = classify_upload_failure(err);
    let context = format!("batch {}", batch_index);
    let message = format!("insert failed [{}]: {}", failure_type, err);

    match failure_type {
        FailureType::Unexpected => error(Stage::Upload, Some(&context), &message),
        FailureType::Expected | FailureType::Unknown => warn(Stage::Upload, Some(&context), &message),
    }
}

/// Log an error that aborted the run
pub fn log_stage_failure(stage: Stage, err: &dyn std::error::Error) {
    error(stage, None, &format!("run aborted: {}", err));
}

// ---------------------------------------------------------------------------
// Upload Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a batched upload
pub fn log_upload_summary(total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Upload complete: {}/{} batches successful, {} failed",
        successful, total, failed
    );

    if failed == 0 {
        info(Stage::Upload, None, &message);
    } else if successful == 0 {
        error(Stage::Upload, None, &message);
    } else {
        warn(Stage::Upload, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parses_both_warning_spellings() {
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_stage_labels_follow_pipeline_order() {
        let labels: Vec<String> = [Stage::Load, Stage::Redistribute, Stage::Validate, Stage::Output, Stage::Upload]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(labels, vec!["LOAD", "REDIST", "VALID", "OUT", "UPLOAD"]);
    }

    #[test]
    fn test_failure_classification() {
        let conflict = SinkError::Http { status: 409, body: "duplicate".to_string() };
        assert_eq!(classify_upload_failure(&conflict), FailureType::Expected);

        let unauthorized = SinkError::Http { status: 401, body: String::new() };
        assert_eq!(classify_upload_failure(&unauthorized), FailureType::Unexpected);

        let unavailable = SinkError::Http { status: 503, body: String::new() };
        assert_eq!(classify_upload_failure(&unavailable), FailureType::Unknown);

        let timeout = SinkError::Transport("operation timed out".to_string());
        assert_eq!(classify_upload_failure(&timeout), FailureType::Unknown);

        let dup = SinkError::Database("duplicate key value violates unique constraint".to_string());
        assert_eq!(classify_upload_failure(&dup), FailureType::Expected);
    }

    #[test]
    fn test_log_file_receives_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let logger = Logger {
            min_level: LogLevel::Info,
            log_file: Some(path.to_string_lossy().into_owned()),
            console_timestamps: false,
        };

        logger.log(LogLevel::Debug, Stage::Load, None, "hidden");
        logger.log(LogLevel::Warning, Stage::Upload, Some("batch 2"), "slow");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("hidden"));
        assert!(contents.contains("WARN UPLOAD [batch 2]: slow"));
    }
}
