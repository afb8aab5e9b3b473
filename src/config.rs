//! Configuration for the weekly demand service
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (WEEKLY_DEMAND_AMPLITUDE, etc.)
//! 2. Config file (`weekly_demand.toml`, or the path in WEEKLY_DEMAND_CONFIG)
//! 3. Built-in defaults
//!
//! # Example Config File (weekly_demand.toml)
//!
//! ```toml
//! [redistribution]
//! amplitude = 0.10
//!
//! [input]
//! path = "2021.csv"
//!
//! [output]
//! scale = "percentage"
//! csv_path = "weekly_demand_percentage.csv"
//! report_path = "validation_report.json"
//!
//! [upload]
//! enabled = true
//! backend = "rest"
//! table = "weekly_demand"
//! batch_size = 100
//!
//! [logging]
//! level = "info"
//! file = "weekly_demand.log"
//! ```
//!
//! Upload credentials are never read from this file. They come from the
//! environment or a `.env` file: SUPABASE_URL + SUPABASE_KEY for the REST
//! backend, DATABASE_URL for the Postgres backend.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::analysis::redistribute::DEFAULT_AMPLITUDE;
use crate::logging::LogLevel;
use crate::model::DemandScale;
use crate::sink::UploadBackend;
use crate::sink::upload::DEFAULT_BATCH_SIZE;

pub const DEFAULT_CONFIG_FILE: &str = "weekly_demand.toml";
pub const CONFIG_PATH_VAR: &str = "WEEKLY_DEMAND_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub redistribution: RedistributionConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedistributionConfig {
    /// Swing across a month's week block; 0.10 means +/-5%.
    pub amplitude: f64,
}

impl Default for RedistributionConfig {
    fn default() -> Self {
        Self { amplitude: DEFAULT_AMPLITUDE }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Monthly demand CSV.
    pub path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("2021.csv") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub scale: DemandScale,
    /// Weekly demand CSV.
    pub csv_path: PathBuf,
    /// Optional JSON validation report.
    pub report_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            scale: DemandScale::Raw,
            csv_path: PathBuf::from("weekly_demand_predictions.csv"),
            report_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub enabled: bool,
    pub backend: UploadBackend,
    /// Logical table the weekly rows are inserted into.
    pub table: String,
    pub batch_size: usize,
    /// Per-request timeout for the REST backend.
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: UploadBackend::Rest,
            table: "weekly_demand".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: 30,
        }
    }
}

impl UploadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Append log entries to this file as well as the console.
    pub file: Option<String>,
    /// Timestamped console lines instead of the compact format.
    pub timestamps: bool,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration with the full priority chain:
    /// `.env` → config file → env vars → validation.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env first so its values are visible as env vars below
        dotenv::dotenv().ok();

        let mut config = match env::var(CONFIG_PATH_VAR) {
            Ok(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                Self::from_file(&path)?
            }
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?,
            Err(_) => Self::default(),
        };

        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file, without env overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Overlay `WEEKLY_DEMAND_*` variables, read through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = lookup("WEEKLY_DEMAND_AMPLITUDE") {
            self.redistribution.amplitude = value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "WEEKLY_DEMAND_AMPLITUDE",
                message: format!("'{}' is not a number", value),
            })?;
        }
        if let Some(value) = lookup("WEEKLY_DEMAND_SCALE") {
            self.output.scale = value.parse().map_err(|message| ConfigError::Invalid {
                key: "WEEKLY_DEMAND_SCALE",
                message,
            })?;
        }
        if let Some(value) = lookup("WEEKLY_DEMAND_INPUT") {
            self.input.path = PathBuf::from(value);
        }
        if let Some(value) = lookup("WEEKLY_DEMAND_OUTPUT") {
            self.output.csv_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("WEEKLY_DEMAND_UPLOAD") {
            self.upload.enabled = parse_bool(&value).ok_or_else(|| ConfigError::Invalid {
                key: "WEEKLY_DEMAND_UPLOAD",
                message: format!("'{}' is not a boolean", value),
            })?;
        }
        if let Some(value) = lookup("WEEKLY_DEMAND_LOG_LEVEL") {
            self.logging.level = value.parse().map_err(|message| ConfigError::Invalid {
                key: "WEEKLY_DEMAND_LOG_LEVEL",
                message,
            })?;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let amplitude = self.redistribution.amplitude;
        // Factors are 1 +/- amplitude/2 at most; keep every week positive.
        if !amplitude.is_finite() || !(0.0..2.0).contains(&amplitude) {
            return Err(ConfigError::Invalid {
                key: "redistribution.amplitude",
                message: format!("{} is outside [0, 2)", amplitude),
            });
        }
        if self.upload.batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "upload.batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        if self.upload.table.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "upload.table",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
