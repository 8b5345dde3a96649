//! Tour solver: runs a routing engine over a distance matrix with the depot
//! fixed as both start and end.

use std::time::Instant;

use tracing::{debug, warn};

use crate::engine::{Assignment, RoutingModel, SearchParameters};
use crate::matrix::DistanceMatrix;
use crate::search::LocalSearchEngine;
use crate::traits::RoutingEngine;

/// Result of one solver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Matrix positions from the depot. The closing return to the depot may
    /// or may not be present.
    Route(Vec<usize>),
    /// The engine reported no usable tour.
    Infeasible,
}

#[derive(Debug, Clone)]
pub struct TourSolver<E = LocalSearchEngine> {
    engine: E,
    parameters: SearchParameters,
}

impl TourSolver<LocalSearchEngine> {
    /// Solver backed by the built-in engine.
    pub fn with_parameters(parameters: SearchParameters) -> Self {
        Self::new(LocalSearchEngine, parameters)
    }
}

impl Default for TourSolver<LocalSearchEngine> {
    fn default() -> Self {
        Self::with_parameters(SearchParameters::default())
    }
}

impl<E: RoutingEngine> TourSolver<E> {
    pub fn new(engine: E, parameters: SearchParameters) -> Self {
        Self { engine, parameters }
    }

    pub fn parameters(&self) -> &SearchParameters {
        &self.parameters
    }

    /// Run the engine once.
    ///
    /// Arc costs are the exact matrix entries. There is no retry: a failed
    /// or unusable engine result is reported as [`SolveOutcome::Infeasible`].
    pub fn solve(&self, matrix: &DistanceMatrix, depot: usize) -> SolveOutcome {
        if depot >= matrix.len() {
            warn!(depot, nodes = matrix.len(), "depot position outside matrix");
            return SolveOutcome::Infeasible;
        }

        let mut model = RoutingModel::new(matrix.len(), depot);
        model.register_transit_callback(|from, to| matrix.distance(from, to));

        let started = Instant::now();
        let Some(assignment) = self.engine.solve(&model, &self.parameters) else {
            warn!(nodes = matrix.len(), "routing engine found no solution");
            return SolveOutcome::Infeasible;
        };

        match walk(&assignment, matrix.len(), depot) {
            Some(route) => {
                debug!(
                    nodes = matrix.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "solved tour"
                );
                SolveOutcome::Route(route)
            }
            None => {
                warn!(nodes = matrix.len(), "routing engine returned an incomplete tour");
                SolveOutcome::Infeasible
            }
        }
    }
}

/// Follow successor links from the depot.
///
/// Returns `None` unless the walk starts at the depot, visits every node
/// exactly once and either stops or closes back onto the depot.
fn walk(assignment: &Assignment, node_count: usize, depot: usize) -> Option<Vec<usize>> {
    if assignment.start() != depot {
        return None;
    }

    let mut seen = vec![false; node_count];
    seen[depot] = true;
    let mut route = vec![depot];
    let mut node = depot;

    while let Some(next) = assignment.next(node) {
        if next == depot {
            route.push(depot);
            break;
        }
        if next >= node_count || seen[next] {
            return None;
        }
        seen[next] = true;
        route.push(next);
        node = next;
    }

    seen.iter().all(|visited| *visited).then_some(route)
}
