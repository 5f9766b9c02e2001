//! CSV snapshot export for the delay summary tables.
//!
//! Snapshots act as a cache: a run can be skipped while all four files
//! exist, and deleting a file invalidates it.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::delay::types::DelayReport;

pub const ROUTE_SUMMARY_FILE: &str = "route_delay_summary.csv";
pub const TRACK_POINTS_FILE: &str = "route_track_points.csv";
pub const DELAY_BY_HOUR_FILE: &str = "delay_by_hour.csv";
pub const MOST_DELAYED_STOPS_FILE: &str = "most_delayed_stops.csv";

const SNAPSHOT_FILES: [&str; 4] = [
    ROUTE_SUMMARY_FILE,
    TRACK_POINTS_FILE,
    DELAY_BY_HOUR_FILE,
    MOST_DELAYED_STOPS_FILE,
];

/// Writes one table of serializable rows to a CSV file, headers included,
/// replacing any previous snapshot.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing CSV snapshot");

    let file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes all four summary tables of a [`DelayReport`] into `out_dir`.
pub fn export_report(report: &DelayReport, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create output dir {}", out_dir.display()))?;

    write_table(&out_dir.join(ROUTE_SUMMARY_FILE), &report.route_summary)?;
    write_table(&out_dir.join(TRACK_POINTS_FILE), &report.track_points)?;
    write_table(&out_dir.join(DELAY_BY_HOUR_FILE), &report.hourly)?;
    write_table(&out_dir.join(MOST_DELAYED_STOPS_FILE), &report.top_stops)?;

    info!(out_dir = %out_dir.display(), "Export completed");
    Ok(())
}

/// True when every snapshot file already exists in `out_dir`.
pub fn snapshots_exist(out_dir: &Path) -> bool {
    SNAPSHOT_FILES.iter().all(|f| out_dir.join(f).exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::types::{HourlyDelay, RouteDelaySummary};
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("bus_pulse_output_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_write_table_includes_header_once() {
        let dir = temp_dir("header");
        let path = dir.join("route_delay_summary.csv");
        let rows = vec![
            RouteDelaySummary { route_id: "R1".into(), delay_minutes: 6.0 },
            RouteDelaySummary { route_id: "R2".into(), delay_minutes: 3.0 },
        ];

        write_table(&path, &rows).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "route_id,delay_minutes");
        assert_eq!(lines[1], "R1,6.0");
    }

    #[test]
    fn test_write_table_replaces_previous_snapshot() {
        let dir = temp_dir("replace");
        let path = dir.join("delay_by_hour.csv");

        write_table(&path, &[HourlyDelay { hour: 8, delay_minutes: 2.0 }]).unwrap();
        write_table(&path, &[HourlyDelay { hour: 9, delay_minutes: 4.0 }]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("8,2.0"));
        assert!(content.contains("9,4.0"));
    }

    #[test]
    fn test_snapshots_exist_requires_all_files() {
        let dir = temp_dir("exists");
        assert!(!snapshots_exist(&dir));

        for f in SNAPSHOT_FILES {
            fs::write(dir.join(f), "x\n").unwrap();
        }
        assert!(snapshots_exist(&dir));

        fs::remove_file(dir.join(DELAY_BY_HOUR_FILE)).unwrap();
        assert!(!snapshots_exist(&dir));
    }
}
