//! Monthly-to-weekly redistribution.
//!
//! Each month's total is split evenly across its week block and then tilted
//! by position: earlier weeks in the block get slightly less, later weeks
//! slightly more. For a block of `k` weeks, week `i` (1-indexed) has
//!
//! ```text
//! p_i = i / (k + 1)
//! f_i = 1 + (p_i - 0.5) * amplitude
//! d_i = round(monthly / k * f_i)
//! ```
//!
//! The positions are symmetric about 0.5, so the unrounded weekly values
//! sum to the monthly total exactly. Rounding to whole units can move the
//! block sum by at most `k / 2`; that drift is reported by `verify`, not
//! corrected here.
//!
//! Rounding is half-to-even (`f64::round_ties_even`): 2.5 -> 2, 3.5 -> 4.

use crate::analysis::groupings::MonthTable;
use crate::calendar::WEEK_CALENDAR;
use crate::model::{DemandError, WeeklyDemand};

/// Default swing across a block: +/-5% around the even split.
pub const DEFAULT_AMPLITUDE: f64 = 0.10;

/// Positional weighting factor for week `position` (1-indexed) of a block
/// of `block_len` weeks.
pub fn week_factor(position: usize, block_len: usize, amplitude: f64) -> f64 {
    let normalized_position = position as f64 / (block_len as f64 + 1.0);
    1.0 + (normalized_position - 0.5) * amplitude
}

/// Splits one month's demand across `weeks`, in block order.
///
/// Returns `(week_no, raw_demand)` pairs; each demand is a whole number.
pub fn redistribute_month(monthly_demand: f64, weeks: &[u32], amplitude: f64) -> Vec<(u32, f64)> {
    let block_len = weeks.len();
    let even_share = monthly_demand / block_len as f64;

    weeks
        .iter()
        .enumerate()
        .map(|(i, &week_no)| {
            let factor = week_factor(i + 1, block_len, amplitude);
            (week_no, (even_share * factor).round_ties_even())
        })
        .collect()
}

/// Expands one crop's twelve monthly values into 52 weekly values.
///
/// Output is in month-then-position order, which is also week order.
/// Fails with `MissingMonth` for the first month absent from `months`.
/// Tables from `group_by_crop` are already checked for bad demand values;
/// hand-built ones get the same `InvalidDemand` check here.
pub fn redistribute_crop(
    crop_id: i64,
    months: &MonthTable,
    amplitude: f64,
) -> Result<Vec<WeeklyDemand>, DemandError> {
    let mut weekly = Vec::with_capacity(52);

    for block in WEEK_CALENDAR {
        let monthly_demand = *months.get(&block.month_no).ok_or(DemandError::MissingMonth {
            crop_id,
            month_no: block.month_no,
        })?;

        if !monthly_demand.is_finite() || monthly_demand < 0.0 {
            return Err(DemandError::InvalidDemand {
                crop_id,
                month_no: block.month_no,
                demand: monthly_demand,
            });
        }

        weekly.extend(
            redistribute_month(monthly_demand, block.weeks, amplitude)
                .into_iter()
                .map(|(week_no, demand)| WeeklyDemand { crop_id, week_no, demand }),
        );
    }

    Ok(weekly)
}
