//! Reference-table joins and delay derivation.

use crate::delay::types::CompleteRecord;
use crate::tables::ReferenceTables;
use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Governs what happens when a row has no actual arrival timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPolicy {
    /// Substitute a uniform random integer in [1, 15) minutes per row.
    Synthesize,
    /// Fail with an error naming the missing column.
    RequireActual,
}

/// Left-joins trips, routes, stop_times and stops into one record per
/// (trip, stop) pair, then derives `delay_minutes` for each.
///
/// # Errors
///
/// Fails on unparseable timestamps, and on missing actual arrivals when
/// `policy` is [`DelayPolicy::RequireActual`].
pub fn build_complete_records(
    tables: &ReferenceTables,
    policy: DelayPolicy,
) -> Result<Vec<CompleteRecord>> {
    let routes: HashMap<&str, _> = tables
        .routes
        .iter()
        .map(|r| (r.route_id.as_str(), r))
        .collect();
    let trips: HashMap<&str, _> = tables
        .trips
        .iter()
        .map(|t| (t.trip_id.as_str(), t))
        .collect();
    let stops: HashMap<&str, _> = tables
        .stops
        .iter()
        .map(|s| (s.stop_id.as_str(), s))
        .collect();

    let mut synthesized = 0usize;
    let mut records = Vec::with_capacity(tables.stop_times.len());

    for st in &tables.stop_times {
        let trip = trips.get(st.trip_id.as_str());
        let route = trip.and_then(|t| routes.get(t.route_id.as_str()));
        let stop = stops.get(st.stop_id.as_str());

        let scheduled = parse_arrival(&st.arrival_time).with_context(|| {
            format!(
                "unparseable arrival_time {:?} for trip {} stop {}",
                st.arrival_time, st.trip_id, st.stop_id
            )
        })?;

        let actual = match &st.actual_arrival_time {
            Some(raw) if !raw.trim().is_empty() => Some(parse_arrival(raw).with_context(|| {
                format!(
                    "unparseable actual_arrival_time {:?} for trip {} stop {}",
                    raw, st.trip_id, st.stop_id
                )
            })?),
            _ => None,
        };

        let delay_minutes = match actual {
            Some(actual) => (actual - scheduled).num_seconds() as f64 / 60.0,
            None => match policy {
                DelayPolicy::Synthesize => {
                    synthesized += 1;
                    rand::rng().random_range(1..15) as f64
                }
                DelayPolicy::RequireActual => bail!(
                    "missing actual_arrival_time for trip {} stop {} and synthetic delay is disabled",
                    st.trip_id,
                    st.stop_id
                ),
            },
        };

        records.push(CompleteRecord {
            trip_id: st.trip_id.clone(),
            route_id: trip.map(|t| t.route_id.clone()),
            route_no: route.and_then(|r| r.route_no.clone()),
            stop_id: st.stop_id.clone(),
            stop_name: stop.map(|s| s.stop_name.clone()),
            stop_lat: stop.map(|s| s.stop_lat),
            stop_lon: stop.map(|s| s.stop_lon),
            scheduled_arrival: scheduled,
            actual_arrival: actual,
            delay_minutes,
        });
    }

    if synthesized > 0 {
        warn!(
            rows = synthesized,
            "No actual arrival data for some rows, delay values are simulated"
        );
    }
    debug!(records = records.len(), "Complete records built");

    Ok(records)
}

fn parse_arrival(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{Route, Stop, StopTime, Trip};

    fn tables() -> ReferenceTables {
        ReferenceTables {
            routes: vec![Route {
                route_id: "R1".into(),
                route_no: Some("15-G".into()),
            }],
            stops: vec![Stop {
                stop_id: "S1".into(),
                stop_name: "KR Market".into(),
                stop_lat: 12.96368,
                stop_lon: 77.57742,
            }],
            stop_times: vec![StopTime {
                trip_id: "T1".into(),
                stop_id: "S1".into(),
                arrival_time: "09:00:00".into(),
                actual_arrival_time: Some("09:07:00".into()),
            }],
            trips: vec![Trip {
                trip_id: "T1".into(),
                route_id: "R1".into(),
            }],
        }
    }

    #[test]
    fn test_delay_is_exact_signed_minutes() {
        let records = build_complete_records(&tables(), DelayPolicy::RequireActual).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].delay_minutes, 7.0);
        assert_eq!(records[0].route_id.as_deref(), Some("R1"));
        assert_eq!(records[0].stop_name.as_deref(), Some("KR Market"));
    }

    #[test]
    fn test_early_arrival_is_negative() {
        let mut t = tables();
        t.stop_times[0].actual_arrival_time = Some("08:57:30".into());
        let records = build_complete_records(&t, DelayPolicy::RequireActual).unwrap();
        assert_eq!(records[0].delay_minutes, -2.5);
    }

    #[test]
    fn test_missing_reference_yields_none_fields() {
        let mut t = tables();
        t.trips.clear();
        t.stops.clear();
        let records = build_complete_records(&t, DelayPolicy::RequireActual).unwrap();
        assert_eq!(records[0].route_id, None);
        assert_eq!(records[0].stop_name, None);
    }

    #[test]
    fn test_synthesized_delay_in_range() {
        let mut t = tables();
        t.stop_times[0].actual_arrival_time = None;
        for _ in 0..50 {
            let records = build_complete_records(&t, DelayPolicy::Synthesize).unwrap();
            let d = records[0].delay_minutes;
            assert!((1.0..15.0).contains(&d), "delay {d} out of range");
            assert_eq!(d.fract(), 0.0);
        }
    }

    #[test]
    fn test_missing_actual_without_synthetic_fails() {
        let mut t = tables();
        t.stop_times[0].actual_arrival_time = None;
        let err = build_complete_records(&t, DelayPolicy::RequireActual).unwrap_err();
        assert!(err.to_string().contains("actual_arrival_time"));
    }

    #[test]
    fn test_malformed_timestamp_fails_fast() {
        let mut t = tables();
        t.stop_times[0].arrival_time = "soonish".into();
        let err = build_complete_records(&t, DelayPolicy::Synthesize).unwrap_err();
        assert!(err.to_string().contains("arrival_time"));
        assert!(err.to_string().contains("T1"));
    }
}
