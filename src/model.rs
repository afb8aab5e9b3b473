/// Core data types for the weekly demand service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O: only records, the output scale, and the errors raised
/// while turning monthly demand into weekly demand.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// One observed monthly demand figure for a crop.
///
/// Corresponds to one row of the monthly input CSV. The pair
/// `(crop_id, month_no)` is unique within a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    pub crop_id: i64,
    pub month_no: u32, // 1-12
    pub demand: f64,
}

/// One synthetic weekly demand figure for a crop.
///
/// `demand` is in raw units (always a whole number) or on the 0-100
/// percentage scale, depending on the `DemandScale` the run used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRecord {
    pub id: u64,
    pub crop_id: i64,
    pub week_no: u32, // 1-52
    pub demand: f64,
}

/// A weekly figure before ids are assigned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeeklyDemand {
    pub crop_id: i64,
    pub week_no: u32,
    pub demand: f64,
}

// ---------------------------------------------------------------------------
// Output scale
// ---------------------------------------------------------------------------

/// Unit of the weekly demand column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemandScale {
    /// Whole units, redistributed from the monthly totals.
    #[default]
    Raw,
    /// 0-100 relative to each crop's own weekly maximum.
    Percentage,
}

impl fmt::Display for DemandScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemandScale::Raw => write!(f, "raw"),
            DemandScale::Percentage => write!(f, "percentage"),
        }
    }
}

impl std::str::FromStr for DemandScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(DemandScale::Raw),
            "percentage" | "percent" => Ok(DemandScale::Percentage),
            other => Err(format!("unknown demand scale '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that make a monthly dataset unusable for redistribution.
///
/// Any of these aborts the run before output is written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DemandError {
    /// A crop has no demand value for one of the twelve months.
    #[error("crop {crop_id} has no demand for month {month_no}")]
    MissingMonth { crop_id: i64, month_no: u32 },

    /// A demand value is negative or not a finite number.
    #[error("crop {crop_id} month {month_no}: invalid demand {demand}")]
    InvalidDemand { crop_id: i64, month_no: u32, demand: f64 },

    /// A month number outside 1-12.
    #[error("crop {crop_id}: month number {month_no} is outside 1-12")]
    InvalidMonth { crop_id: i64, month_no: u32 },

    /// The same (crop, month) pair appears more than once.
    #[error("crop {crop_id} has more than one row for month {month_no}")]
    DuplicateMonth { crop_id: i64, month_no: u32 },

    /// A crop's weekly maximum is zero or negative, so it cannot be scaled to 100.
    #[error("crop {crop_id} cannot be normalized: maximum weekly demand is {max_demand}")]
    DegenerateCrop { crop_id: i64, max_demand: f64 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
