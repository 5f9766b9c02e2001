//! Data types produced by the delay pipeline.

use chrono::NaiveTime;
use serde::Serialize;

/// Fully-joined row for one (trip, stop) pair. Reference lookups that did not
/// match stay `None`, matching the left-join behavior of the pipeline.
#[derive(Debug, Clone)]
pub struct CompleteRecord {
    pub trip_id: String,
    pub route_id: Option<String>,
    pub route_no: Option<String>,
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
    pub scheduled_arrival: NaiveTime,
    pub actual_arrival: Option<NaiveTime>,
    pub delay_minutes: f64,
}

/// Mean delay for one route, ordered descending in the summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDelaySummary {
    pub route_id: String,
    pub delay_minutes: f64,
}

/// Mean delay for one stop name. Grouping is by name, not id, so distinct
/// physical stops sharing a name are merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopDelay {
    pub stop_name: String,
    pub delay_minutes: f64,
}

/// Mean delay for one scheduled hour of day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyDelay {
    pub hour: u32,
    pub delay_minutes: f64,
}

/// A stop's identity and coordinates, used for map rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
}

/// Complete output of one delay pipeline run.
#[derive(Debug)]
pub struct DelayReport {
    pub route_summary: Vec<RouteDelaySummary>,
    pub top_stops: Vec<StopDelay>,
    pub hourly: Vec<HourlyDelay>,
    pub track_points: Vec<TrackPoint>,
}
