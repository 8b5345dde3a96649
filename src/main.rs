use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tour_planner::config::PlannerConfig;
use tour_planner::engine::SearchParameters;
use tour_planner::export::write_tour_file;
use tour_planner::haversine::HaversineMatrix;
use tour_planner::osrm::{OsrmClient, OsrmConfig};
use tour_planner::planner::{MatrixSource, Planner, RouteOutcome, RouteSpec};
use tour_planner::solver::TourSolver;
use tour_planner::stop::{Stop, StopId, catalog_stops, load_catalog};
use tour_planner::traits::DistanceMatrixProvider;
use tour_planner::{PlannerError, Tour};

#[derive(Parser)]
#[command(name = "tour-planner")]
#[command(about = "Closed delivery tours from a depot over road distances", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan every route of a config file
    Plan {
        /// Routes config (JSON)
        #[arg(long)]
        config: PathBuf,
        /// Write one CSV per planned route into this directory
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
    /// Solve one route over a stop catalog
    Solve {
        /// Stop catalog (JSONL)
        #[arg(long)]
        stops: PathBuf,
        /// Depot stop id
        #[arg(long)]
        depot: StopId,
        /// Only stops tagged with this route
        #[arg(long)]
        route: Option<String>,
        /// Stop ids to visit besides the depot (comma separated)
        #[arg(long, value_delimiter = ',')]
        select: Option<Vec<StopId>>,
        /// OSRM base URL (overrides OSRM_URL)
        #[arg(long)]
        osrm_url: Option<String>,
        /// Use great-circle distances instead of OSRM
        #[arg(long)]
        haversine: bool,
        /// Solver budget in milliseconds
        #[arg(long)]
        time_limit_ms: Option<u64>,
    },
}

type Provider = Box<dyn DistanceMatrixProvider + Send + Sync>;

/// Per-route entry of the printed report.
#[derive(Serialize)]
#[serde(untagged)]
enum RouteReport<'a> {
    Tour(&'a Tour),
    Error { error: String },
}

impl<'a> From<&'a RouteOutcome> for RouteReport<'a> {
    fn from(outcome: &'a RouteOutcome) -> Self {
        match outcome {
            Ok(tour) => RouteReport::Tour(tour),
            Err(err) => RouteReport::Error {
                error: err.to_string(),
            },
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan { config, csv_dir } => plan(&config, csv_dir.as_deref()),
        Commands::Solve {
            stops,
            depot,
            route,
            select,
            osrm_url,
            haversine,
            time_limit_ms,
        } => {
            let mut osrm = OsrmConfig::from_env();
            if let Some(url) = osrm_url {
                osrm.base_url = url;
            }
            let mut parameters = SearchParameters::default();
            if let Some(ms) = time_limit_ms {
                parameters = parameters.with_time_limit(Duration::from_millis(ms));
            }

            let provider = provider(osrm, haversine)?;
            let planner = Planner::new(provider).with_solver(TourSolver::with_parameters(parameters));

            let source = MatrixSource::Catalog {
                path: stops,
                route,
            };
            let mut spec = RouteSpec::new("solve", source, depot);
            spec.selected_ids = select;

            let tour = planner.plan_route(&spec)?;
            println!("{}", serde_json::to_string_pretty(&tour)?);
            Ok(())
        }
    }
}

fn plan(config_path: &Path, csv_dir: Option<&Path>) -> Result<()> {
    let config = PlannerConfig::from_path(config_path)?;
    let osrm = config.osrm.clone().with_env_override();

    let planner = Planner::new(provider(osrm, false)?)
        .with_solver(TourSolver::with_parameters(config.search.clone()))
        .with_max_selected(config.max_selected);
    let planner = match config.max_workers {
        Some(workers) => planner.with_max_workers(workers),
        None => planner,
    };

    let results = planner.run_all(&config.routes);

    let report: BTreeMap<&str, RouteReport<'_>> = results
        .iter()
        .map(|(name, outcome)| (name.as_str(), RouteReport::from(outcome)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(dir) = csv_dir {
        let failed = export_csvs(dir, &config.routes, &results);
        if failed > 0 {
            bail!("{} route CSV file(s) could not be written to {}", failed, dir.display());
        }
    }
    Ok(())
}

fn provider(osrm: OsrmConfig, haversine: bool) -> Result<Provider> {
    if haversine {
        info!("using great-circle distances");
        return Ok(Box::new(HaversineMatrix::default()));
    }
    info!(url = %osrm.base_url, "using OSRM distances");
    let client = OsrmClient::new(osrm).context("failed to build HTTP client")?;
    Ok(Box::new(client))
}

/// Write one CSV per planned route. Returns how many routes failed; each
/// failure is logged and does not stop the others.
fn export_csvs(
    dir: &Path,
    specs: &[RouteSpec],
    results: &BTreeMap<String, RouteOutcome>,
) -> usize {
    let planned: Vec<(&RouteSpec, &Tour)> = specs
        .iter()
        .filter_map(|spec| match results.get(&spec.name) {
            Some(Ok(tour)) => Some((spec, tour)),
            _ => None,
        })
        .collect();

    if let Err(err) = fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), %err, "cannot create CSV directory");
        return planned.len();
    }

    let mut failed = 0;
    for (spec, tour) in planned {
        let stops = stops_of(spec).unwrap_or_default();
        match write_tour_file(dir, &spec.name, tour, &stops) {
            Ok(path) => info!(route = %spec.name, path = %path.display(), "wrote tour CSV"),
            Err(err) => {
                warn!(route = %spec.name, %err, "failed to write tour CSV");
                failed += 1;
            }
        }
    }
    failed
}

/// Stop details for CSV rows. Table routes carry only ids.
fn stops_of(spec: &RouteSpec) -> Result<Vec<Stop>, PlannerError> {
    match &spec.source {
        MatrixSource::File(_) => Ok(Vec::new()),
        MatrixSource::Stops(stops) => Ok(stops.clone()),
        MatrixSource::Catalog { path, route } => Ok(catalog_stops(
            &load_catalog(path)?,
            route.as_deref(),
            spec.depot_id,
        )),
    }
}
