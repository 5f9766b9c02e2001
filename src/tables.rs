//! Typed CSV input tables and validated loaders.
//!
//! Each reference table is loaded into typed records up front, with
//! duplicate join keys and malformed values rejected at load time rather
//! than surfacing mid-aggregation.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// One row of `routes.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub route_id: String,
    #[serde(default)]
    pub route_no: Option<String>,
}

/// One row of `stops.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
}

/// One row of `stop_times.csv`. Arrival times stay as raw strings here;
/// parsing happens in the delay pipeline where the failure can name the row.
#[derive(Debug, Clone, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    pub stop_id: String,
    pub arrival_time: String,
    #[serde(default)]
    pub actual_arrival_time: Option<String>,
}

/// One row of `trips.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
}

/// One raw row of `all_routes_boarding.csv`. Fields are strings so that a
/// fully-empty row can be dropped before integer coercion.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardingRow {
    #[serde(default)]
    pub route_id: String,
    #[serde(default)]
    pub bus_id: String,
    #[serde(default)]
    pub stop_sequence: String,
    #[serde(default)]
    pub stop_name: String,
    #[serde(default)]
    pub boarded: String,
    #[serde(default)]
    pub deboarded: String,
    #[serde(default)]
    pub capacity: String,
}

impl BoardingRow {
    pub fn is_empty(&self) -> bool {
        [
            &self.route_id,
            &self.bus_id,
            &self.stop_sequence,
            &self.stop_name,
            &self.boarded,
            &self.deboarded,
            &self.capacity,
        ]
        .iter()
        .all(|f| f.trim().is_empty())
    }
}

/// All reference tables needed by the delay pipeline.
#[derive(Debug)]
pub struct ReferenceTables {
    pub routes: Vec<Route>,
    pub stops: Vec<Stop>,
    pub stop_times: Vec<StopTime>,
    pub trips: Vec<Trip>,
}

impl ReferenceTables {
    /// Loads `routes.csv`, `stops.csv`, `stop_times.csv` and `trips.csv`
    /// from `data_dir`, validating join-key uniqueness.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let routes: Vec<Route> = load_table(&data_dir.join("routes.csv"))?;
        let stops: Vec<Stop> = load_table(&data_dir.join("stops.csv"))?;
        let stop_times: Vec<StopTime> = load_table(&data_dir.join("stop_times.csv"))?;
        let trips: Vec<Trip> = load_table(&data_dir.join("trips.csv"))?;

        // Duplicate join keys would silently fan out rows on merge.
        check_unique("routes.csv", "route_id", routes.iter().map(|r| &r.route_id))?;
        check_unique("stops.csv", "stop_id", stops.iter().map(|s| &s.stop_id))?;
        check_unique("trips.csv", "trip_id", trips.iter().map(|t| &t.trip_id))?;

        debug!(
            routes = routes.len(),
            stops = stops.len(),
            stop_times = stop_times.len(),
            trips = trips.len(),
            "Reference tables loaded"
        );

        Ok(Self {
            routes,
            stops,
            stop_times,
            trips,
        })
    }
}

/// Loads one CSV file into typed records, failing with the file name on any
/// unreadable or malformed row.
pub fn load_table<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("missing input file {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: T =
            result.with_context(|| format!("malformed row in {}", path.display()))?;
        rows.push(record);
    }

    Ok(rows)
}

/// Loads the boarding table, dropping fully-empty rows.
pub fn load_boarding(path: &Path) -> Result<Vec<BoardingRow>> {
    let rows: Vec<BoardingRow> = load_table(path)?;
    let total = rows.len();
    let rows: Vec<_> = rows.into_iter().filter(|r| !r.is_empty()).collect();

    if rows.len() < total {
        debug!(dropped = total - rows.len(), "Dropped fully-empty boarding rows");
    }

    Ok(rows)
}

fn check_unique<'a>(
    file: &str,
    column: &str,
    keys: impl Iterator<Item = &'a String>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            bail!("duplicate {column} {key:?} in {file}; join keys must be unique");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("bus_pulse_tables_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_table_missing_file() {
        let dir = temp_dir("missing");
        let err = load_table::<Route>(&dir.join("routes.csv")).unwrap_err();
        assert!(err.to_string().contains("routes.csv"));
    }

    #[test]
    fn test_duplicate_route_id_rejected() {
        let dir = temp_dir("dup");
        fs::write(dir.join("routes.csv"), "route_id,route_no\nR1,15-G\nR1,16\n").unwrap();
        fs::write(dir.join("stops.csv"), "stop_id,stop_name,stop_lat,stop_lon\n").unwrap();
        fs::write(dir.join("stop_times.csv"), "trip_id,stop_id,arrival_time\n").unwrap();
        fs::write(dir.join("trips.csv"), "trip_id,route_id\n").unwrap();

        let err = ReferenceTables::load(&dir).unwrap_err();
        assert!(err.to_string().contains("route_id"));
        assert!(err.to_string().contains("R1"));
    }

    #[test]
    fn test_load_boarding_drops_empty_rows() {
        let dir = temp_dir("boarding");
        fs::write(
            dir.join("all_routes_boarding.csv"),
            "route_id,bus_id,stop_sequence,stop_name,boarded,deboarded,capacity\n\
             R1,B1,1,Majestic,10,0,50\n\
             ,,,,,,\n\
             R1,B1,2,Market,5,8,50\n",
        )
        .unwrap();

        let rows = load_boarding(&dir.join("all_routes_boarding.csv")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].stop_name, "Market");
    }

    #[test]
    fn test_malformed_stop_lat_fails() {
        let dir = temp_dir("malformed");
        fs::write(
            dir.join("stops.csv"),
            "stop_id,stop_name,stop_lat,stop_lon\nS1,Majestic,not-a-number,77.57\n",
        )
        .unwrap();

        let err = load_table::<Stop>(&dir.join("stops.csv")).unwrap_err();
        assert!(err.to_string().contains("malformed row"));
    }
}
