//! Weekly demand service
//!
//! Turns per-crop monthly demand into synthetic weekly demand, optionally
//! scaled to 0-100 per crop, checks the result against the monthly totals,
//! and writes it to CSV and (optionally) a remote table.

pub mod analysis;
pub mod calendar;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod sink;
pub mod verify;
