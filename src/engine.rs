//! Optimization engine contract: the model handed to an engine, the search
//! parameters it honours, and the assignment it hands back.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wall-clock budget for one solve.
pub const DEFAULT_TIME_LIMIT_MS: u64 = 8_000;

/// Default cap on guided local search rounds. The time limit usually binds
/// first.
pub const DEFAULT_MAX_ROUNDS: usize = 100_000;

/// Heuristic used to build the first feasible tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstSolutionStrategy {
    /// Extend the path from its last node along the cheapest outgoing arc.
    PathCheapestArc,
    /// Visit nodes in index order.
    Sequential,
}

/// Metaheuristic applied once the first tour is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalSearchMetaheuristic {
    /// Stop at the first local minimum.
    GreedyDescent,
    /// Penalize arcs of each local minimum and keep searching until the
    /// budget runs out.
    GuidedLocalSearch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParameters {
    /// Wall-clock budget in milliseconds.
    pub time_limit_ms: u64,
    pub first_solution_strategy: FirstSolutionStrategy,
    pub local_search_metaheuristic: LocalSearchMetaheuristic,
    /// Upper bound on metaheuristic rounds.
    pub max_rounds: usize,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            time_limit_ms: DEFAULT_TIME_LIMIT_MS,
            first_solution_strategy: FirstSolutionStrategy::PathCheapestArc,
            local_search_metaheuristic: LocalSearchMetaheuristic::GuidedLocalSearch,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl SearchParameters {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_metaheuristic(mut self, metaheuristic: LocalSearchMetaheuristic) -> Self {
        self.local_search_metaheuristic = metaheuristic;
        self
    }

    pub fn with_first_solution_strategy(mut self, strategy: FirstSolutionStrategy) -> Self {
        self.first_solution_strategy = strategy;
        self
    }
}

type TransitCallback<'a> = Box<dyn Fn(usize, usize) -> i64 + Send + Sync + 'a>;

/// A closed single-vehicle routing problem over `node_count` positions.
pub struct RoutingModel<'a> {
    node_count: usize,
    depot: usize,
    transit: Option<TransitCallback<'a>>,
}

impl fmt::Debug for RoutingModel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingModel")
            .field("node_count", &self.node_count)
            .field("depot", &self.depot)
            .field("transit", &self.transit.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl<'a> RoutingModel<'a> {
    /// A model whose only vehicle starts and ends at `depot`.
    pub fn new(node_count: usize, depot: usize) -> Self {
        Self {
            node_count,
            depot,
            transit: None,
        }
    }

    /// Register the cost of travelling from one position to another.
    pub fn register_transit_callback<F>(&mut self, callback: F)
    where
        F: Fn(usize, usize) -> i64 + Send + Sync + 'a,
    {
        self.transit = Some(Box::new(callback));
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn depot(&self) -> usize {
        self.depot
    }

    /// True once a transit callback is registered and the depot is a node.
    pub fn is_ready(&self) -> bool {
        self.transit.is_some() && self.depot < self.node_count
    }

    /// Cost of the arc `from -> to`; zero until a callback is registered.
    pub fn transit_cost(&self, from: usize, to: usize) -> i64 {
        self.transit.as_ref().map_or(0, |callback| callback(from, to))
    }
}

/// Successor links produced by an engine.
///
/// Walking from [`Assignment::start`] with [`Assignment::next`] yields the
/// visiting order. The walk ends when `next` returns `None`; engines may
/// also close the loop by linking the last node back to the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    start: usize,
    next: Vec<Option<usize>>,
}

impl Assignment {
    /// Link the nodes of `route` in order.
    ///
    /// Returns `None` when `route` is empty, mentions a node outside the
    /// model, or gives a node two successors.
    pub fn from_route(node_count: usize, route: &[usize]) -> Option<Self> {
        let (&start, rest) = route.split_first()?;
        if start >= node_count {
            return None;
        }

        let mut next = vec![None; node_count];
        let mut previous = start;
        for &node in rest {
            if node >= node_count || next[previous].is_some() {
                return None;
            }
            next[previous] = Some(node);
            previous = node;
        }

        Some(Self { start, next })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Successor of `node`, or `None` at the end of the route.
    pub fn next(&self, node: usize) -> Option<usize> {
        self.next.get(node).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transit_cost_reads_registered_callback() {
        let costs = [[0, 3], [4, 0]];
        let mut model = RoutingModel::new(2, 0);
        assert!(!model.is_ready());

        model.register_transit_callback(|from, to| costs[from][to]);

        assert!(model.is_ready());
        assert_eq!(model.transit_cost(0, 1), 3);
        assert_eq!(model.transit_cost(1, 0), 4);
    }

    #[test]
    fn depot_outside_model_is_not_ready() {
        let mut model = RoutingModel::new(2, 5);
        model.register_transit_callback(|_, _| 1);
        assert!(!model.is_ready());
    }

    #[test]
    fn assignment_walks_route() {
        let assignment = Assignment::from_route(4, &[2, 0, 3, 1]).unwrap();
        assert_eq!(assignment.start(), 2);
        assert_eq!(assignment.next(2), Some(0));
        assert_eq!(assignment.next(0), Some(3));
        assert_eq!(assignment.next(3), Some(1));
        assert_eq!(assignment.next(1), None);
    }

    #[test]
    fn assignment_may_close_the_loop() {
        let assignment = Assignment::from_route(3, &[0, 2, 1, 0]).unwrap();
        assert_eq!(assignment.next(1), Some(0));
    }

    #[test]
    fn assignment_rejects_bad_routes() {
        assert!(Assignment::from_route(3, &[]).is_none());
        assert!(Assignment::from_route(3, &[0, 7]).is_none());
        assert!(Assignment::from_route(3, &[0, 1, 0, 2]).is_none());
    }

    #[test]
    fn parameters_deserialize_with_defaults() {
        let parameters: SearchParameters =
            serde_json::from_str(r#"{"time_limit_ms": 250, "local_search_metaheuristic": "greedy_descent"}"#)
                .unwrap();
        assert_eq!(parameters.time_limit(), Duration::from_millis(250));
        assert_eq!(
            parameters.local_search_metaheuristic,
            LocalSearchMetaheuristic::GreedyDescent
        );
        assert_eq!(
            parameters.first_solution_strategy,
            FirstSolutionStrategy::PathCheapestArc
        );
    }
}
