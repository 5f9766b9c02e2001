//! CLI entry point for the bus delay and crowding analytics tool.
//!
//! Provides subcommands for running the delay aggregation pipeline over the
//! reference CSVs, querying the crowd forecast for one bus journey, and
//! serving the thin proxy to the upstream live-vehicle API.

use anyhow::Result;
use bus_pulse::crowd;
use bus_pulse::delay::aggregate::{build_report, delay_alert, sample_route_id};
use bus_pulse::delay::join::{DelayPolicy, build_complete_records};
use bus_pulse::output::{export_report, snapshots_exist};
use bus_pulse::proxy;
use bus_pulse::proxy::upstream::DEFAULT_BASE_URL;
use bus_pulse::tables::{ReferenceTables, load_boarding};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bus_pulse")]
#[command(about = "Delay and crowding analytics for a public-transit demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the delay aggregation pipeline and export CSV snapshots
    Delay {
        /// Directory containing routes.csv, stops.csv, stop_times.csv, trips.csv
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory the summary CSVs are written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Simulate delay values for rows without an actual arrival time
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        synthetic: bool,

        /// Recompute even when all snapshot files already exist
        #[arg(short, long, default_value_t = false)]
        force: bool,

        /// Route id to print a delay alert for (defaults to the first record's route)
        #[arg(long)]
        alert_route: Option<String>,

        /// Mean delay in minutes above which a route is flagged
        #[arg(long, default_value_t = 5.0)]
        alert_threshold: f64,
    },
    /// Show the crowd forecast for the upcoming stops of one bus journey
    Crowd {
        /// Boarding counts CSV
        #[arg(short, long, default_value = "all_routes_boarding.csv")]
        input: PathBuf,

        /// Route id of the journey
        #[arg(short, long)]
        route: String,

        /// Bus id of the journey
        #[arg(short, long)]
        bus: String,

        /// Name of the stop the bus is at now
        #[arg(short, long)]
        current_stop: String,
    },
    /// Serve the HTTP proxy to the upstream live-vehicle API
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bus_pulse.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bus_pulse.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Delay {
            data_dir,
            output_dir,
            synthetic,
            force,
            alert_route,
            alert_threshold,
        } => {
            run_delay(
                &data_dir,
                &output_dir,
                synthetic,
                force,
                alert_route,
                alert_threshold,
            )?;
        }
        Commands::Crowd {
            input,
            route,
            bus,
            current_stop,
        } => {
            run_crowd(&input, &route, &bus, &current_stop)?;
        }
        Commands::Serve { port } => {
            let base_url =
                std::env::var("UPSTREAM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
            proxy::serve(port, base_url).await?;
        }
    }

    Ok(())
}

#[tracing::instrument(skip_all, fields(data_dir = %data_dir.display()))]
fn run_delay(
    data_dir: &Path,
    output_dir: &Path,
    synthetic: bool,
    force: bool,
    alert_route: Option<String>,
    alert_threshold: f64,
) -> Result<()> {
    // Existing snapshots are a cache; delete a file (or pass --force) to
    // invalidate it.
    if !force && snapshots_exist(output_dir) {
        info!(
            output_dir = %output_dir.display(),
            "All snapshot files exist, skipping recomputation (use --force to rerun)"
        );
        return Ok(());
    }

    let tables = ReferenceTables::load(data_dir)?;

    let policy = if synthetic {
        DelayPolicy::Synthesize
    } else {
        DelayPolicy::RequireActual
    };
    let records = build_complete_records(&tables, policy)?;
    let report = build_report(&records);

    let alert_route =
        alert_route.or_else(|| sample_route_id(&records).map(str::to_string));
    if let Some(route_id) = alert_route {
        match delay_alert(&report.route_summary, &route_id, alert_threshold) {
            Some(message) => info!(route_id = %route_id, "{message}"),
            None => warn!(route_id = %route_id, "No delay summary for route, skipping alert"),
        }
    }

    export_report(&report, output_dir)?;

    info!(
        routes = report.route_summary.len(),
        top_stops = report.top_stops.len(),
        hours = report.hourly.len(),
        track_points = report.track_points.len(),
        "Delay pipeline complete"
    );
    Ok(())
}

#[tracing::instrument(skip_all, fields(route, bus, current_stop))]
fn run_crowd(input: &Path, route: &str, bus: &str, current_stop: &str) -> Result<()> {
    let rows = load_boarding(input)?;
    let records = crowd::estimate(&rows)?;
    let view = crowd::upcoming_stops(&records, route, bus, current_stop)?;

    info!(
        stop = %view.current.stop_name,
        passengers = view.current.passengers,
        capacity = view.current.capacity,
        percent = %format!("{:.1}", view.current.crowd_percent),
        level = %view.current.crowd_level,
        "Current stop"
    );

    if view.upcoming.is_empty() {
        info!("No upcoming stops, this bus is at or near its final stop");
    }
    for stop in &view.upcoming {
        info!(
            seq = stop.stop_sequence,
            stop = %stop.stop_name,
            passengers = stop.passengers,
            percent = %format!("{:.1}", stop.crowd_percent),
            level = %stop.crowd_level,
            "Upcoming stop"
        );
    }

    Ok(())
}
