/// Monthly-to-weekly demand computation.
///
/// Everything here is pure: records in, records out, no I/O and no global
/// state. Configuration (amplitude, scale) is passed in by the caller.
///
/// Submodules:
/// - `groupings` — organizes flat monthly rows into per-crop month tables.
/// - `redistribute` — expands each month into its week block.
/// - `normalize` — rescales a crop's weeks onto 0-100.

pub mod groupings;
pub mod normalize;
pub mod redistribute;

use crate::model::{DemandError, DemandScale, MonthlyRecord, WeeklyDemand, WeeklyRecord};

/// Builds the complete, ordered weekly dataset for one run.
///
/// Groups and checks the monthly rows, redistributes every crop, normalizes
/// when `scale` is `Percentage`, then sorts by `(crop_id, week_no)` and
/// assigns ids from 1. The first error aborts the whole build.
pub fn build_weekly_dataset(
    monthly: &[MonthlyRecord],
    amplitude: f64,
    scale: DemandScale,
) -> Result<Vec<WeeklyRecord>, DemandError> {
    let crops = groupings::group_by_crop(monthly)?;

    let mut weekly = Vec::with_capacity(crops.len() * crate::calendar::WEEKS_PER_YEAR as usize);
    for (crop_id, months) in &crops {
        let raw = redistribute::redistribute_crop(*crop_id, months, amplitude)?;
        match scale {
            DemandScale::Raw => weekly.extend(raw),
            DemandScale::Percentage => weekly.extend(normalize::normalize_crop(*crop_id, &raw)?),
        }
    }

    Ok(assign_ids(weekly))
}

/// Sorts weekly figures by `(crop_id, week_no)` and numbers them from 1.
pub fn assign_ids(mut weekly: Vec<WeeklyDemand>) -> Vec<WeeklyRecord> {
    weekly.sort_by_key(|w| (w.crop_id, w.week_no));
    weekly
        .into_iter()
        .enumerate()
        .map(|(i, w)| WeeklyRecord {
            id: i as u64 + 1,
            crop_id: w.crop_id,
            week_no: w.week_no,
            demand: w.demand,
        })
        .collect()
}
