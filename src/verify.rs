//! Weekly Dataset Verification Module
//!
//! Checks a computed weekly dataset against the monthly input it came from.
//! Two checks exist, one per output scale:
//!
//! - raw: every crop/month's weekly values should sum back to the monthly
//!   total (rounding can move it by a few units; the report shows how much)
//! - percentage: every crop's busiest week should be exactly 100
//!
//! Findings are informational. Nothing here fails a run.

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::calendar;
use crate::model::{DemandScale, MonthlyRecord, WeeklyRecord};

/// Allowed distance from 100 for a normalized maximum.
pub const PEAK_TOLERANCE: f64 = 1e-9;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub timestamp: String,
    pub scale: DemandScale,
    pub check: ValidationCheck,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationCheck {
    MassConservation(ConservationReport),
    Normalization(NormalizationReport),
}

/// One crop/month comparison between the monthly total and its weeks.
#[derive(Debug, Clone, Serialize)]
pub struct MonthComparison {
    pub crop_id: i64,
    pub month_no: u32,
    pub monthly_demand: f64,
    pub weekly_sum: f64,
    /// `monthly_demand - weekly_sum`
    pub difference: f64,
    /// `difference / monthly_demand * 100`. NaN when the monthly demand is
    /// zero; serialized as `null`.
    pub difference_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConservationReport {
    pub rows: Vec<MonthComparison>,
    pub summary: ConservationSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConservationSummary {
    pub months_checked: usize,
    pub months_exact: usize,
    pub mean_abs_difference: f64,
    /// Mean over rows with a defined percentage; `None` if there are none.
    pub mean_abs_difference_percent: Option<f64>,
    pub max_abs_difference: f64,
    /// Rows whose monthly demand is zero, so the percentage is undefined.
    pub undefined_percent_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CropPeak {
    pub crop_id: i64,
    pub max_weekly_demand: f64,
    pub reaches_100: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizationReport {
    pub crops: Vec<CropPeak>,
    /// Crops whose maximum is not 100.
    pub violations: Vec<i64>,
    /// Weeks equal to 100 across the whole dataset.
    pub weeks_at_100: usize,
}

impl ValidationReport {
    /// True when the check found nothing to flag.
    pub fn is_clean(&self) -> bool {
        match &self.check {
            ValidationCheck::MassConservation(r) => r.summary.months_exact == r.summary.months_checked,
            ValidationCheck::Normalization(r) => r.violations.is_empty(),
        }
    }
}

// ============================================================================
// Mass Conservation
// ============================================================================

/// Compares each monthly total with the sum of its weeks.
///
/// Rows come out ordered by `(crop_id, month_no)`. Monthly rows whose crop
/// has no weeks at all compare against a sum of zero.
pub fn check_mass_conservation(monthly: &[MonthlyRecord], weekly: &[WeeklyRecord]) -> ConservationReport {
    let mut weekly_sums: HashMap<(i64, u32), f64> = HashMap::new();
    for record in weekly {
        if let Some(month_no) = calendar::month_of(record.week_no) {
            *weekly_sums.entry((record.crop_id, month_no)).or_insert(0.0) += record.demand;
        }
    }

    let mut ordered: Vec<&MonthlyRecord> = monthly.iter().collect();
    ordered.sort_by_key(|m| (m.crop_id, m.month_no));

    let rows: Vec<MonthComparison> = ordered
        .into_iter()
        .map(|m| {
            let weekly_sum = weekly_sums.get(&(m.crop_id, m.month_no)).copied().unwrap_or(0.0);
            let difference = m.demand - weekly_sum;
            MonthComparison {
                crop_id: m.crop_id,
                month_no: m.month_no,
                monthly_demand: m.demand,
                weekly_sum,
                difference,
                difference_percent: difference / m.demand * 100.0,
            }
        })
        .collect();

    let summary = summarize_conservation(&rows);
    ConservationReport { rows, summary }
}

fn summarize_conservation(rows: &[MonthComparison]) -> ConservationSummary {
    let months_checked = rows.len();
    let months_exact = rows.iter().filter(|r| r.difference == 0.0).count();

    let abs_diffs: Vec<f64> = rows.iter().map(|r| r.difference.abs()).collect();
    let mean_abs_difference = if abs_diffs.is_empty() {
        0.0
    } else {
        abs_diffs.iter().sum::<f64>() / abs_diffs.len() as f64
    };
    let max_abs_difference = abs_diffs.iter().copied().fold(0.0, f64::max);

    let defined: Vec<f64> = rows
        .iter()
        .map(|r| r.difference_percent)
        .filter(|p| p.is_finite())
        .map(f64::abs)
        .collect();
    let mean_abs_difference_percent = if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    };

    ConservationSummary {
        months_checked,
        months_exact,
        mean_abs_difference,
        mean_abs_difference_percent,
        max_abs_difference,
        undefined_percent_rows: rows.len() - defined.len(),
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Checks that every crop's weekly maximum is 100.
pub fn check_normalization(weekly: &[WeeklyRecord]) -> NormalizationReport {
    let mut peaks: BTreeMap<i64, f64> = BTreeMap::new();
    for record in weekly {
        let peak = peaks.entry(record.crop_id).or_insert(f64::NEG_INFINITY);
        *peak = peak.max(record.demand);
    }

    let crops: Vec<CropPeak> = peaks
        .into_iter()
        .map(|(crop_id, max_weekly_demand)| CropPeak {
            crop_id,
            max_weekly_demand,
            reaches_100: is_hundred(max_weekly_demand),
        })
        .collect();

    let violations = crops.iter().filter(|c| !c.reaches_100).map(|c| c.crop_id).collect();
    let weeks_at_100 = weekly.iter().filter(|r| is_hundred(r.demand)).count();

    NormalizationReport {
        crops,
        violations,
        weeks_at_100,
    }
}

fn is_hundred(value: f64) -> bool {
    (value - 100.0).abs() <= PEAK_TOLERANCE
}

// ============================================================================
// Full Verification Runner
// ============================================================================

/// Runs the check that matches `scale`.
pub fn validate(monthly: &[MonthlyRecord], weekly: &[WeeklyRecord], scale: DemandScale) -> ValidationReport {
    let check = match scale {
        DemandScale::Raw => ValidationCheck::MassConservation(check_mass_conservation(monthly, weekly)),
        DemandScale::Percentage => ValidationCheck::Normalization(check_normalization(weekly)),
    };

    ValidationReport {
        timestamp: Utc::now().to_rfc3339(),
        scale,
        check,
    }
}

pub fn print_summary(report: &ValidationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VALIDATION SUMMARY ({} demand)", report.scale);
    println!("═══════════════════════════════════════════════════════════");
    println!();

    match &report.check {
        ValidationCheck::MassConservation(r) => {
            let s = &r.summary;
            println!("Months checked:                {}", s.months_checked);
            println!("Months summing exactly:        {}", s.months_exact);
            println!("Average absolute difference:   {:.2}", s.mean_abs_difference);
            match s.mean_abs_difference_percent {
                Some(p) => println!("Average percentage difference: {:.2}%", p),
                None => println!("Average percentage difference: n/a"),
            }
            println!("Largest absolute difference:   {:.2}", s.max_abs_difference);
            if s.undefined_percent_rows > 0 {
                println!(
                    "⚠ {} month(s) with zero monthly demand (percentage undefined)",
                    s.undefined_percent_rows
                );
            }
        }
        ValidationCheck::Normalization(r) => {
            println!("Crops checked:        {}", r.crops.len());
            println!("Crops peaking at 100: {}", r.crops.len() - r.violations.len());
            println!("Weeks at 100:         {}", r.weeks_at_100);
            for crop in r.crops.iter().filter(|c| !c.reaches_100) {
                println!(
                    "✗ crop {}: maximum weekly demand is {}",
                    crop.crop_id, crop.max_weekly_demand
                );
            }
        }
    }

    println!("═══════════════════════════════════════════════════════════");
}

// ============================================================================
// Tests
// ============================================================================
