/// Grouping of flat monthly rows into per-crop month tables.
///
/// The input CSV is one row per (crop, month); the redistributor wants one
/// complete month table per crop. This is where the input invariants are
/// enforced: months in 1-12, one row per pair, finite non-negative demand.

use std::collections::BTreeMap;

use crate::calendar::MONTHS;
use crate::model::{DemandError, MonthlyRecord};

/// Month number -> monthly demand for one crop.
pub type MonthTable = BTreeMap<u32, f64>;

/// Groups monthly rows by crop, ordered by ascending `crop_id`.
///
/// Does not check completeness: a crop with fewer than twelve months is
/// returned as-is and rejected later by the redistributor with
/// `MissingMonth`, which names the first absent month.
pub fn group_by_crop(records: &[MonthlyRecord]) -> Result<BTreeMap<i64, MonthTable>, DemandError> {
    let mut crops: BTreeMap<i64, MonthTable> = BTreeMap::new();

    for record in records {
        if record.month_no < 1 || record.month_no > MONTHS {
            return Err(DemandError::InvalidMonth {
                crop_id: record.crop_id,
                month_no: record.month_no,
            });
        }
        if !record.demand.is_finite() || record.demand < 0.0 {
            return Err(DemandError::InvalidDemand {
                crop_id: record.crop_id,
                month_no: record.month_no,
                demand: record.demand,
            });
        }

        let months = crops.entry(record.crop_id).or_default();
        if months.insert(record.month_no, record.demand).is_some() {
            return Err(DemandError::DuplicateMonth {
                crop_id: record.crop_id,
                month_no: record.month_no,
            });
        }
    }

    Ok(crops)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(crop_id: i64, month_no: u32, demand: f64) -> MonthlyRecord {
        MonthlyRecord { crop_id, month_no, demand }
    }

    #[test]
    fn test_groups_rows_by_crop_in_ascending_order() {
        let rows = vec![row(5, 2, 20.0), row(1, 1, 10.0), row(5, 1, 15.0)];
        let crops = group_by_crop(&rows).unwrap();

        assert_eq!(crops.keys().copied().collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(crops[&5].get(&1), Some(&15.0));
        assert_eq!(crops[&5].get(&2), Some(&20.0));
    }

    #[test]
    fn test_rejects_duplicate_month() {
        let rows = vec![row(1, 4, 10.0), row(1, 4, 11.0)];
        assert_eq!(
            group_by_crop(&rows),
            Err(DemandError::DuplicateMonth { crop_id: 1, month_no: 4 })
        );
    }

    #[test]
    fn test_rejects_month_outside_calendar() {
        assert_eq!(
            group_by_crop(&[row(3, 13, 1.0)]),
            Err(DemandError::InvalidMonth { crop_id: 3, month_no: 13 })
        );
        assert_eq!(
            group_by_crop(&[row(3, 0, 1.0)]),
            Err(DemandError::InvalidMonth { crop_id: 3, month_no: 0 })
        );
    }

    #[test]
    fn test_rejects_negative_demand() {
        let err = group_by_crop(&[row(2, 6, -0.5)]).unwrap_err();
        assert_eq!(
            err,
            DemandError::InvalidDemand { crop_id: 2, month_no: 6, demand: -0.5 }
        );
    }

    #[test]
    fn test_rejects_nan_demand() {
        let err = group_by_crop(&[row(2, 6, f64::NAN)]).unwrap_err();
        assert!(matches!(err, DemandError::InvalidDemand { crop_id: 2, month_no: 6, .. }));
    }

    #[test]
    fn test_zero_demand_is_allowed() {
        let crops = group_by_crop(&[row(1, 1, 0.0)]).unwrap();
        assert_eq!(crops[&1][&1], 0.0);
    }
}
