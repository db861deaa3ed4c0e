use anyhow::Result;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use trafficstack::dashboard::{DashboardFrame, FilterState};
use trafficstack::store;

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();
    info!("startup");

    // ─── 2) configure paths ──────────────────────────────────────────
    let data_dir = PathBuf::from(
        env::var("TRAFFIC_DATA_DIR").unwrap_or_else(|_| "data/shp_files".to_string()),
    );
    let cache_path = PathBuf::from(
        env::var("TRAFFIC_CACHE").unwrap_or_else(|_| "data/unified.parquet".to_string()),
    );

    // ─── 3) load cache or run the pipeline ───────────────────────────
    let table = store::load_or_build(&data_dir, &cache_path)?;
    info!(
        rows = table.len(),
        stations = table.station_count(),
        years = ?table.years(),
        "unified table ready"
    );

    // ─── 4) sanity-log the presentation contract ─────────────────────
    let frame = DashboardFrame::new(&table);
    let unfiltered = FilterState::default();
    info!(
        route_types = frame.route_type_options(&unfiltered).len(),
        counties = frame.county_options(&unfiltered).len(),
        routes = frame.route_options(&unfiltered).len(),
        latest_year = ?frame.latest_year(),
        "slicer options derived"
    );

    Ok(())
}
