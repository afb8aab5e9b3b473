//! Percentage normalization of a crop's weekly demand.

use crate::model::{DemandError, WeeklyDemand};

/// Value the busiest week of every crop is scaled to.
pub const PERCENT_SCALE: f64 = 100.0;

/// Rounds to two decimal places, ties to even.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Rescales one crop's raw weekly values onto 0-100.
///
/// Each week becomes `raw / max_raw * 100`, rounded to two decimals, so the
/// crop's busiest week is exactly 100.00. A crop whose maximum is zero or
/// negative (or that has no weeks at all) fails with `DegenerateCrop`.
pub fn normalize_crop(crop_id: i64, raw: &[WeeklyDemand]) -> Result<Vec<WeeklyDemand>, DemandError> {
    let max_raw = raw.iter().map(|w| w.demand).fold(f64::NEG_INFINITY, f64::max);

    if raw.is_empty() {
        return Err(DemandError::DegenerateCrop { crop_id, max_demand: 0.0 });
    }
    if max_raw <= 0.0 || !max_raw.is_finite() {
        return Err(DemandError::DegenerateCrop { crop_id, max_demand: max_raw });
    }

    Ok(raw
        .iter()
        .map(|w| WeeklyDemand {
            demand: round_to_cents(w.demand / max_raw * PERCENT_SCALE),
            ..*w
        })
        .collect())
}
