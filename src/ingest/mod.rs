/// Input loaders.
///
/// - `monthly_csv` — the per-crop monthly demand table.

pub mod monthly_csv;
