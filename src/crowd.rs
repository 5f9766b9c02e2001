//! Crowd estimation pipeline.
//!
//! Turns per-stop boarding/deboarding counts into a running occupancy per
//! (route, bus) journey and classifies each stop into a crowd level.

use crate::tables::BoardingRow;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fmt;

/// Categorical crowd bucket. Buckets are contiguous and totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CrowdLevel {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
}

impl CrowdLevel {
    /// | Percent      | Level  |
    /// |--------------|--------|
    /// | < 40         | LOW    |
    /// | 40 – <70     | MEDIUM |
    /// | >= 70        | HIGH   |
    pub fn from_percent(p: f64) -> Self {
        if p < 40.0 {
            CrowdLevel::Low
        } else if p < 70.0 {
            CrowdLevel::Medium
        } else {
            CrowdLevel::High
        }
    }
}

impl fmt::Display for CrowdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CrowdLevel::Low => "LOW",
            CrowdLevel::Medium => "MEDIUM",
            CrowdLevel::High => "HIGH",
        };
        f.write_str(s)
    }
}

/// One boarding row with its derived occupancy fields.
#[derive(Debug, Clone, Serialize)]
pub struct CrowdRecord {
    pub route_id: String,
    pub bus_id: String,
    pub stop_sequence: u32,
    pub stop_name: String,
    pub boarded: i64,
    pub deboarded: i64,
    pub capacity: i64,
    pub net_change: i64,
    pub passengers: i64,
    pub crowd_percent: f64,
    pub crowd_level: CrowdLevel,
}

/// Computes occupancy and crowd levels for every boarding row.
///
/// Rows are sorted by (route, bus, stop sequence) before the running sum;
/// the cumulative-sum step is only correct under that ordering. Each row's
/// passenger count is the group's raw running net change clamped at zero;
/// the clamp does not reset the running sum itself, so a deficit must be
/// boarded away before the count goes positive again.
///
/// # Errors
///
/// Fails on non-numeric counts and on capacity <= 0, which would otherwise
/// make the percentage meaningless.
pub fn estimate(rows: &[BoardingRow]) -> Result<Vec<CrowdRecord>> {
    let mut typed = Vec::with_capacity(rows.len());
    for row in rows {
        typed.push(coerce(row)?);
    }

    typed.sort_by(|a, b| {
        (&a.route_id, &a.bus_id, a.stop_sequence).cmp(&(&b.route_id, &b.bus_id, b.stop_sequence))
    });

    let mut out: Vec<CrowdRecord> = Vec::with_capacity(typed.len());
    let mut running: i64 = 0;

    for row in typed {
        let new_group = out
            .last()
            .map(|prev: &CrowdRecord| {
                prev.route_id != row.route_id || prev.bus_id != row.bus_id
            })
            .unwrap_or(true);
        if new_group {
            running = 0;
        }

        let net_change = row.boarded - row.deboarded;
        running += net_change;
        let passengers = running.max(0);
        // Multiply before dividing so round counts come out exact (700/50 is
        // 14.0, while 7/50*100 picks up float noise).
        let crowd_percent = passengers as f64 * 100.0 / row.capacity as f64;

        out.push(CrowdRecord {
            route_id: row.route_id,
            bus_id: row.bus_id,
            stop_sequence: row.stop_sequence,
            stop_name: row.stop_name,
            boarded: row.boarded,
            deboarded: row.deboarded,
            capacity: row.capacity,
            net_change,
            passengers,
            crowd_percent,
            crowd_level: CrowdLevel::from_percent(crowd_percent),
        });
    }

    Ok(out)
}

/// The crowd view for one bus at one stop: where it is now, and the expected
/// crowd at every stop still ahead of it.
#[derive(Debug, Serialize)]
pub struct JourneyView {
    pub current: CrowdRecord,
    pub upcoming: Vec<CrowdRecord>,
}

/// Filters to one (route, bus) journey and splits it at the current stop.
/// Upcoming stops are those with a strictly greater sequence number, in
/// sequence order; the current stop itself is excluded from them.
pub fn upcoming_stops(
    records: &[CrowdRecord],
    route_id: &str,
    bus_id: &str,
    current_stop: &str,
) -> Result<JourneyView> {
    let journey: Vec<&CrowdRecord> = records
        .iter()
        .filter(|r| r.route_id == route_id && r.bus_id == bus_id)
        .collect();

    if journey.is_empty() {
        bail!("no boarding data for route {route_id} bus {bus_id}");
    }

    let current = journey
        .iter()
        .find(|r| r.stop_name == current_stop)
        .with_context(|| {
            format!("no stop named {current_stop:?} on route {route_id} bus {bus_id}")
        })?;

    let upcoming = journey
        .iter()
        .filter(|r| r.stop_sequence > current.stop_sequence)
        .map(|r| (*r).clone())
        .collect();

    Ok(JourneyView {
        current: (*current).clone(),
        upcoming,
    })
}

struct TypedRow {
    route_id: String,
    bus_id: String,
    stop_sequence: u32,
    stop_name: String,
    boarded: i64,
    deboarded: i64,
    capacity: i64,
}

fn coerce(row: &BoardingRow) -> Result<TypedRow> {
    let parse_int = |field: &str, value: &str| -> Result<i64> {
        value.trim().parse().with_context(|| {
            format!(
                "non-numeric {field} {value:?} for route {} bus {} stop {:?}",
                row.route_id, row.bus_id, row.stop_name
            )
        })
    };

    let capacity = parse_int("capacity", &row.capacity)?;
    if capacity <= 0 {
        bail!(
            "capacity {} for route {} bus {} stop {:?} must be positive",
            capacity,
            row.route_id,
            row.bus_id,
            row.stop_name
        );
    }

    let stop_sequence: u32 = row.stop_sequence.trim().parse().with_context(|| {
        format!(
            "invalid stop_sequence {:?} for route {} bus {} stop {:?} (must be a non-negative integer)",
            row.stop_sequence, row.route_id, row.bus_id, row.stop_name
        )
    })?;

    Ok(TypedRow {
        route_id: row.route_id.clone(),
        bus_id: row.bus_id.clone(),
        stop_sequence,
        stop_name: row.stop_name.clone(),
        boarded: parse_int("boarded", &row.boarded)?,
        deboarded: parse_int("deboarded", &row.deboarded)?,
        capacity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        route: &str,
        bus: &str,
        seq: u32,
        name: &str,
        boarded: i64,
        deboarded: i64,
        capacity: i64,
    ) -> BoardingRow {
        BoardingRow {
            route_id: route.into(),
            bus_id: bus.into(),
            stop_sequence: seq.to_string(),
            stop_name: name.into(),
            boarded: boarded.to_string(),
            deboarded: deboarded.to_string(),
            capacity: capacity.to_string(),
        }
    }

    #[test]
    fn test_running_occupancy_and_levels() {
        let rows = vec![
            row("R1", "B1", 1, "A", 10, 0, 50),
            row("R1", "B1", 2, "B", 5, 8, 50),
        ];
        let records = estimate(&rows).unwrap();
        assert_eq!(records[0].passengers, 10);
        assert_eq!(records[1].passengers, 7);
        assert_eq!(records[0].crowd_percent, 20.0);
        assert_eq!(records[1].crowd_percent, 14.0);
        assert_eq!(records[0].crowd_level, CrowdLevel::Low);
        assert_eq!(records[1].crowd_level, CrowdLevel::Low);
    }

    #[test]
    fn test_occupancy_never_negative_and_clamp_does_not_reset_sum() {
        let rows = vec![
            row("R1", "B1", 1, "A", 5, 0, 50),
            row("R1", "B1", 2, "B", 0, 10, 50),
            row("R1", "B1", 3, "C", 3, 0, 50),
        ];
        let records = estimate(&rows).unwrap();
        // Raw running sums are 5, -5, -2; the clamp floors the view at zero
        // without resetting the underlying sum.
        assert_eq!(records[1].passengers, 0);
        assert_eq!(records[2].passengers, 0);
    }

    #[test]
    fn test_groups_reset_between_buses() {
        let rows = vec![
            row("R1", "B2", 1, "A", 40, 0, 50),
            row("R1", "B1", 1, "A", 3, 0, 50),
        ];
        let records = estimate(&rows).unwrap();
        // Sorted by (route, bus, seq): B1 first, with its own running sum.
        assert_eq!(records[0].bus_id, "B1");
        assert_eq!(records[0].passengers, 3);
        assert_eq!(records[1].bus_id, "B2");
        assert_eq!(records[1].passengers, 40);
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(CrowdLevel::from_percent(0.0), CrowdLevel::Low);
        assert_eq!(CrowdLevel::from_percent(39.9), CrowdLevel::Low);
        assert_eq!(CrowdLevel::from_percent(40.0), CrowdLevel::Medium);
        assert_eq!(CrowdLevel::from_percent(69.9), CrowdLevel::Medium);
        assert_eq!(CrowdLevel::from_percent(70.0), CrowdLevel::High);
        assert_eq!(CrowdLevel::from_percent(120.0), CrowdLevel::High);
        assert!(CrowdLevel::Low < CrowdLevel::Medium);
        assert!(CrowdLevel::Medium < CrowdLevel::High);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let rows = vec![row("R1", "B1", 1, "A", 10, 0, 0)];
        let err = estimate(&rows).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn test_negative_stop_sequence_rejected() {
        let mut bad = row("R1", "B1", 1, "A", 10, 0, 50);
        bad.stop_sequence = "-1".into();
        let err = estimate(&[bad]).unwrap_err();
        assert!(err.to_string().contains("stop_sequence"));
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_non_numeric_count_rejected() {
        let mut bad = row("R1", "B1", 1, "A", 10, 0, 50);
        bad.boarded = "many".into();
        let err = estimate(&[bad]).unwrap_err();
        assert!(err.to_string().contains("boarded"));
        assert!(err.to_string().contains("many"));
    }

    #[test]
    fn test_upcoming_stops_excludes_current_and_earlier() {
        let rows = vec![
            row("R1", "B1", 1, "A", 10, 0, 50),
            row("R1", "B1", 2, "B", 5, 0, 50),
            row("R1", "B1", 3, "C", 2, 0, 50),
            row("R1", "B2", 1, "A", 1, 0, 50),
        ];
        let records = estimate(&rows).unwrap();
        let view = upcoming_stops(&records, "R1", "B1", "B").unwrap();
        assert_eq!(view.current.stop_name, "B");
        let names: Vec<_> = view.upcoming.iter().map(|r| r.stop_name.as_str()).collect();
        assert_eq!(names, ["C"]);
    }

    #[test]
    fn test_upcoming_stops_empty_at_last_stop() {
        let rows = vec![
            row("R1", "B1", 1, "A", 10, 0, 50),
            row("R1", "B1", 2, "B", 5, 0, 50),
        ];
        let records = estimate(&rows).unwrap();
        let view = upcoming_stops(&records, "R1", "B1", "B").unwrap();
        assert!(view.upcoming.is_empty());
    }

    #[test]
    fn test_unknown_journey_fails() {
        let records = estimate(&[row("R1", "B1", 1, "A", 10, 0, 50)]).unwrap();
        assert!(upcoming_stops(&records, "R1", "B9", "A").is_err());
        assert!(upcoming_stops(&records, "R1", "B1", "Z").is_err());
    }
}
