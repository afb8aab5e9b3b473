/// Week calendar for the weekly demand service.
///
/// Defines the fixed assignment of the 52 demand weeks to the 12 months.
/// This is the single source of truth for week numbering: all other modules
/// should look blocks up from here rather than hardcoding week ranges.
///
/// Each month owns a contiguous block of 4 or 5 weeks. Blocks do not overlap
/// and together cover weeks 1 through 52 exactly once.

// ---------------------------------------------------------------------------
// Calendar constants
// ---------------------------------------------------------------------------

/// Number of months in the calendar.
pub const MONTHS: u32 = 12;

/// Number of demand weeks in the calendar year.
pub const WEEKS_PER_YEAR: u32 = 52;

// ---------------------------------------------------------------------------
// Month blocks
// ---------------------------------------------------------------------------

/// The week block belonging to one month.
pub struct MonthBlock {
    /// Month number, 1 = January.
    pub month_no: u32,
    /// Short English month name, used in reports.
    pub name: &'static str,
    /// Week numbers owned by this month, ascending and contiguous.
    pub weeks: &'static [u32],
}

/// All twelve month blocks in calendar order.
///
/// Cumulative block ends: 4, 8, 13, 17, 22, 26, 31, 35, 39, 44, 48, 52.
pub static WEEK_CALENDAR: &[MonthBlock] = &[
    MonthBlock { month_no: 1, name: "Jan", weeks: &[1, 2, 3, 4] },
    MonthBlock { month_no: 2, name: "Feb", weeks: &[5, 6, 7, 8] },
    MonthBlock { month_no: 3, name: "Mar", weeks: &[9, 10, 11, 12, 13] },
    MonthBlock { month_no: 4, name: "Apr", weeks: &[14, 15, 16, 17] },
    MonthBlock { month_no: 5, name: "May", weeks: &[18, 19, 20, 21, 22] },
    MonthBlock { month_no: 6, name: "Jun", weeks: &[23, 24, 25, 26] },
    MonthBlock { month_no: 7, name: "Jul", weeks: &[27, 28, 29, 30, 31] },
    MonthBlock { month_no: 8, name: "Aug", weeks: &[32, 33, 34, 35] },
    MonthBlock { month_no: 9, name: "Sep", weeks: &[36, 37, 38, 39] },
    MonthBlock { month_no: 10, name: "Oct", weeks: &[40, 41, 42, 43, 44] },
    MonthBlock { month_no: 11, name: "Nov", weeks: &[45, 46, 47, 48] },
    MonthBlock { month_no: 12, name: "Dec", weeks: &[49, 50, 51, 52] },
];

/// Returns the ordered week numbers of `month_no`, or `None` outside 1-12.
pub fn weeks_of(month_no: u32) -> Option<&'static [u32]> {
    find_month(month_no).map(|b| b.weeks)
}

/// Returns the month that owns `week_no`, or `None` outside 1-52.
pub fn month_of(week_no: u32) -> Option<u32> {
    WEEK_CALENDAR
        .iter()
        .find(|b| b.weeks.contains(&week_no))
        .map(|b| b.month_no)
}

/// Looks up a month block by number. Returns `None` if not found.
pub fn find_month(month_no: u32) -> Option<&'static MonthBlock> {
    WEEK_CALENDAR.iter().find(|b| b.month_no == month_no)
}

/// Every week number in calendar order, 1 through 52.
pub fn all_weeks() -> Vec<u32> {
    WEEK_CALENDAR
        .iter()
        .flat_map(|b| b.weeks.iter().copied())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
