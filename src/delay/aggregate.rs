//! Aggregation of complete records into the summary tables.

use crate::delay::types::{
    CompleteRecord, DelayReport, HourlyDelay, RouteDelaySummary, StopDelay, TrackPoint,
};
use crate::delay::utility::mean;
use chrono::Timelike;
use std::collections::{HashMap, HashSet};

/// How many stops the "most delayed stops" table keeps.
const TOP_STOPS: usize = 5;

/// Runs every aggregation over one set of complete records.
pub fn build_report(records: &[CompleteRecord]) -> DelayReport {
    DelayReport {
        route_summary: route_delay_summary(records),
        top_stops: most_delayed_stops(records),
        hourly: delay_by_hour(records),
        track_points: track_points(records),
    }
}

/// Mean delay per route id, sorted descending. The sort is stable, so routes
/// with equal means keep their first-seen order. Records with no matched
/// route are excluded.
pub fn route_delay_summary(records: &[CompleteRecord]) -> Vec<RouteDelaySummary> {
    let groups = group_by(records.iter().filter_map(|r| {
        r.route_id
            .as_deref()
            .map(|route| (route.to_string(), r.delay_minutes))
    }));

    let mut summary: Vec<_> = groups
        .into_iter()
        .map(|(route_id, delays)| RouteDelaySummary {
            route_id,
            delay_minutes: mean(&delays),
        })
        .collect();
    summary.sort_by(|a, b| b.delay_minutes.total_cmp(&a.delay_minutes));
    summary
}

/// Top five stop names by mean delay, descending.
///
/// Grouping is by stop *name*: distinct physical stops that share a name are
/// merged into one row.
pub fn most_delayed_stops(records: &[CompleteRecord]) -> Vec<StopDelay> {
    let groups = group_by(records.iter().filter_map(|r| {
        r.stop_name
            .as_deref()
            .map(|name| (name.to_string(), r.delay_minutes))
    }));

    let mut stops: Vec<_> = groups
        .into_iter()
        .map(|(stop_name, delays)| StopDelay {
            stop_name,
            delay_minutes: mean(&delays),
        })
        .collect();
    stops.sort_by(|a, b| b.delay_minutes.total_cmp(&a.delay_minutes));
    stops.truncate(TOP_STOPS);
    stops
}

/// Mean delay per scheduled hour of day, ascending by hour.
pub fn delay_by_hour(records: &[CompleteRecord]) -> Vec<HourlyDelay> {
    let groups = group_by(
        records
            .iter()
            .map(|r| (r.scheduled_arrival.hour(), r.delay_minutes)),
    );

    let mut hourly: Vec<_> = groups
        .into_iter()
        .map(|(hour, delays)| HourlyDelay {
            hour,
            delay_minutes: mean(&delays),
        })
        .collect();
    hourly.sort_by_key(|h| h.hour);
    hourly
}

/// First route id encountered in the records, in input order. This is the
/// route the track points and the default delay alert are built for.
pub fn sample_route_id(records: &[CompleteRecord]) -> Option<&str> {
    records.iter().find_map(|r| r.route_id.as_deref())
}

/// Track points for the first route id encountered: the records filtered to
/// that route, deduplicated by the full (id, name, lat, lon) tuple with input
/// order preserved.
pub fn track_points(records: &[CompleteRecord]) -> Vec<TrackPoint> {
    let Some(sample_route) = sample_route_id(records) else {
        return Vec::new();
    };
    let sample_route = sample_route.to_string();

    let mut seen = HashSet::new();
    let mut points = Vec::new();

    for r in records {
        if r.route_id.as_deref() != Some(sample_route.as_str()) {
            continue;
        }
        let key = (
            r.stop_id.clone(),
            r.stop_name.clone(),
            r.stop_lat.map(f64::to_bits),
            r.stop_lon.map(f64::to_bits),
        );
        if seen.insert(key) {
            points.push(TrackPoint {
                stop_id: r.stop_id.clone(),
                stop_name: r.stop_name.clone(),
                stop_lat: r.stop_lat,
                stop_lon: r.stop_lon,
            });
        }
    }

    points
}

/// Alert message for one route: delayed beyond `threshold_minutes` suggests
/// an alternate mode, otherwise the route is reported reliable. `None` when
/// the route has no summary row.
pub fn delay_alert(
    summary: &[RouteDelaySummary],
    route_id: &str,
    threshold_minutes: f64,
) -> Option<String> {
    let row = summary.iter().find(|s| s.route_id == route_id)?;
    if row.delay_minutes > threshold_minutes {
        Some(format!(
            "Route {} is usually delayed by {:.2} mins. Suggest a faster alternate.",
            route_id, row.delay_minutes
        ))
    } else {
        Some(format!(
            "Route {} is usually reliable ({:.2} mins delay).",
            route_id, row.delay_minutes
        ))
    }
}

/// Groups (key, value) pairs preserving first-seen key order.
fn group_by<K: std::hash::Hash + Eq + Clone>(
    pairs: impl Iterator<Item = (K, f64)>,
) -> Vec<(K, Vec<f64>)> {
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<f64>)> = Vec::new();

    for (key, value) in pairs {
        match index.get(&key) {
            Some(&i) => groups[i].1.push(value),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![value]));
            }
        }
    }

    groups
}
