//! Route pipelines and the multi-route orchestrator.
//!
//! One route runs strictly in order: register stops, fetch or select a
//! matrix, solve, assemble. Routes share nothing but read-only file
//! matrices, so a batch fans out over a bounded rayon pool.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assemble::{Tour, assemble};
use crate::error::PlannerError;
use crate::matrix::DistanceMatrix;
use crate::search::LocalSearchEngine;
use crate::solver::{SolveOutcome, TourSolver};
use crate::stop::{Stop, StopId, StopRegistry, catalog_stops, load_catalog};
use crate::subset::{select, working_set};
use crate::table::TableMatrix;
use crate::traits::{DistanceMatrixProvider, RoutingEngine};

/// Where a route's distances come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixSource {
    /// A precomputed CSV table keyed by stop id.
    File(PathBuf),
    /// Inline stops, measured by the planner's live provider.
    Stops(Vec<Stop>),
    /// A JSONL stop catalog, optionally narrowed to one tagged route,
    /// measured by the live provider.
    Catalog {
        path: PathBuf,
        #[serde(default)]
        route: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub name: String,
    pub source: MatrixSource,
    pub depot_id: StopId,
    /// Stops to visit besides the depot. `None` visits every stop of the
    /// source; an empty list is skipped by [`Planner::run_all`].
    #[serde(default)]
    pub selected_ids: Option<Vec<StopId>>,
}

impl RouteSpec {
    pub fn new(name: impl Into<String>, source: MatrixSource, depot_id: StopId) -> Self {
        Self {
            name: name.into(),
            source,
            depot_id,
            selected_ids: None,
        }
    }

    pub fn with_selection(mut self, ids: impl Into<Vec<StopId>>) -> Self {
        self.selected_ids = Some(ids.into());
        self
    }

    fn is_empty_selection(&self) -> bool {
        matches!(&self.selected_ids, Some(ids) if ids.is_empty())
    }
}

/// A route's tour, or the error that stopped its pipeline.
pub type RouteOutcome = Result<Tour, PlannerError>;

/// Shared abort switch for a batch.
///
/// Routes that have not started when the flag is raised are reported as
/// [`PlannerError::Cancelled`], as are live routes whose fetch returns after
/// it. A fetch in flight is bounded by the provider's own timeout; solves
/// already running finish within their time budget.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), PlannerError> {
        if self.is_cancelled() {
            Err(PlannerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

type TableCache = HashMap<PathBuf, Result<TableMatrix, PlannerError>>;

/// Runs route pipelines against one live provider and one solver.
#[derive(Debug, Clone)]
pub struct Planner<P, E = LocalSearchEngine> {
    provider: P,
    solver: TourSolver<E>,
    max_workers: Option<usize>,
    max_selected: Option<usize>,
    cancel: CancellationFlag,
}

impl<P: DistanceMatrixProvider> Planner<P, LocalSearchEngine> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            solver: TourSolver::default(),
            max_workers: None,
            max_selected: None,
            cancel: CancellationFlag::new(),
        }
    }
}

impl<P, E> Planner<P, E>
where
    P: DistanceMatrixProvider,
    E: RoutingEngine,
{
    pub fn with_solver<F: RoutingEngine>(self, solver: TourSolver<F>) -> Planner<P, F> {
        Planner {
            provider: self.provider,
            solver,
            max_workers: self.max_workers,
            max_selected: self.max_selected,
            cancel: self.cancel,
        }
    }

    /// Cap on concurrently solved routes. Defaults to available parallelism.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers.max(1));
        self
    }

    /// Cap on stops per route besides the depot.
    pub fn with_max_selected(mut self, limit: Option<usize>) -> Self {
        self.max_selected = limit;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Solve one closed tour over `stops` in registry order.
    ///
    /// The depot is checked before the provider is queried.
    pub fn plan_stops(
        &self,
        depot_id: StopId,
        stops: impl IntoIterator<Item = Stop>,
    ) -> RouteOutcome {
        let registry = StopRegistry::register(stops)?;
        let depot = registry.require_depot(depot_id)?;
        let matrix = self.provider.matrix_for(registry.stops())?;
        self.solve_and_assemble(&matrix, depot, depot_id)
    }

    /// Run the pipeline for a single spec.
    ///
    /// Unlike [`Planner::run_all`], an empty selection is solved and yields
    /// a depot-only tour.
    pub fn plan_route(&self, spec: &RouteSpec) -> RouteOutcome {
        self.plan_source(spec, &TableCache::new())
    }

    /// Run every spec and collect outcomes by route name.
    ///
    /// Failures stay with their own route. Specs with an empty selection
    /// are left out of the result. Each table file is loaded once and
    /// shared between the routes that name it.
    pub fn run_all(&self, specs: &[RouteSpec]) -> BTreeMap<String, RouteOutcome>
    where
        P: Sync,
        E: Sync,
    {
        let active: Vec<&RouteSpec> = specs
            .iter()
            .filter(|spec| {
                if spec.is_empty_selection() {
                    warn!(route = %spec.name, "skipping route with empty selection");
                    false
                } else {
                    true
                }
            })
            .collect();
        if active.is_empty() {
            return BTreeMap::new();
        }

        let tables = self.load_tables(&active);
        let workers = self
            .max_workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .min(active.len())
            .max(1);
        info!(routes = active.len(), workers, "planning routes");

        let run = || -> Vec<(String, RouteOutcome)> {
            active
                .par_iter()
                .map(|spec| (spec.name.clone(), self.run_spec(spec, &tables)))
                .collect()
        };
        let outcomes = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(run),
            Err(err) => {
                warn!(%err, "could not build worker pool; planning on the global pool");
                run()
            }
        };

        let mut results = BTreeMap::new();
        for (name, outcome) in outcomes {
            if results.insert(name.clone(), outcome).is_some() {
                warn!(route = %name, "duplicate route name; keeping the later spec");
            }
        }
        results
    }

    fn load_tables(&self, specs: &[&RouteSpec]) -> TableCache {
        let mut tables = TableCache::new();
        for spec in specs {
            if let MatrixSource::File(path) = &spec.source {
                tables
                    .entry(path.clone())
                    .or_insert_with(|| TableMatrix::load(path));
            }
        }
        tables
    }

    fn run_spec(&self, spec: &RouteSpec, tables: &TableCache) -> RouteOutcome {
        let started = Instant::now();
        let outcome = self.plan_source(spec, tables);

        match &outcome {
            Ok(tour) => info!(
                route = %spec.name,
                stops = tour.stop_count(),
                total_m = tour.total_distance(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "route planned"
            ),
            Err(err) => warn!(route = %spec.name, %err, "route failed"),
        }
        outcome
    }

    fn plan_source(&self, spec: &RouteSpec, tables: &TableCache) -> RouteOutcome {
        self.cancel.check()?;
        match &spec.source {
            MatrixSource::File(path) => match tables.get(path) {
                Some(Ok(table)) => self.plan_table(spec, table.matrix()),
                Some(Err(err)) => Err(err.clone()),
                None => {
                    let table = TableMatrix::load(path)?;
                    self.plan_table(spec, table.matrix())
                }
            },
            MatrixSource::Stops(stops) => self.plan_live(spec, stops.clone()),
            MatrixSource::Catalog { path, route } => {
                let entries = load_catalog(path)?;
                self.plan_live(spec, catalog_stops(&entries, route.as_deref(), spec.depot_id))
            }
        }
    }

    fn plan_table(&self, spec: &RouteSpec, matrix: &DistanceMatrix) -> RouteOutcome {
        let sub = match &spec.selected_ids {
            Some(ids) => {
                self.check_selection(&working_set(spec.depot_id, ids))?;
                select(matrix, spec.depot_id, ids)?
            }
            None => select(matrix, spec.depot_id, matrix.order())?,
        };
        self.solve_and_assemble(&sub, 0, spec.depot_id)
    }

    fn plan_live(&self, spec: &RouteSpec, stops: Vec<Stop>) -> RouteOutcome {
        let registry = StopRegistry::register(stops)?;
        registry.require_depot(spec.depot_id)?;

        let ids = match &spec.selected_ids {
            Some(selected) => {
                let ids = working_set(spec.depot_id, selected);
                self.check_selection(&ids)?;
                ids
            }
            None => working_set(spec.depot_id, &registry.ordered_ids()),
        };
        let stops = registry.stops_for(&ids)?;

        self.cancel.check()?;
        debug!(route = %spec.name, stops = stops.len(), "fetching live matrix");
        let matrix = self.provider.matrix_for(&stops)?;
        self.cancel.check()?;
        self.solve_and_assemble(&matrix, 0, spec.depot_id)
    }

    fn check_selection(&self, working: &[StopId]) -> Result<(), PlannerError> {
        let selected = working.len().saturating_sub(1);
        match self.max_selected {
            Some(limit) if selected > limit => Err(PlannerError::Validation(format!(
                "{} stops selected, at most {} allowed",
                selected, limit
            ))),
            _ => Ok(()),
        }
    }

    fn solve_and_assemble(
        &self,
        matrix: &DistanceMatrix,
        depot: usize,
        depot_id: StopId,
    ) -> RouteOutcome {
        match self.solver.solve(matrix, depot) {
            SolveOutcome::Route(raw) => assemble(&raw, matrix, depot_id),
            SolveOutcome::Infeasible => Ok(Tour::depot_only(depot_id)),
        }
    }
}
