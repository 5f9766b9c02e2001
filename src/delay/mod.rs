//! Delay aggregation pipeline.
//!
//! Joins the trip/route/stop reference tables into complete per-(trip, stop)
//! records, derives a signed delay-minutes value for each, and aggregates
//! into the summary tables exported as CSV snapshots.

pub mod aggregate;
pub mod join;
pub mod types;
pub mod utility;
