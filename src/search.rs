//! Built-in routing engine: cheapest-arc construction followed by 2-opt and
//! relocate local search, optionally guided by arc penalties.

use std::time::Instant;

use tracing::debug;

use crate::engine::{
    Assignment, FirstSolutionStrategy, LocalSearchMetaheuristic, RoutingModel, SearchParameters,
};
use crate::traits::RoutingEngine;

/// Scales arc penalties relative to the average arc cost of the first local
/// minimum.
const PENALTY_COEFFICIENT: f64 = 0.1;

/// With at most this many nodes 2-opt alone reaches every tour.
const TRIVIAL_NODE_COUNT: usize = 3;

/// Single-vehicle engine with a wall-clock budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSearchEngine;

impl RoutingEngine for LocalSearchEngine {
    fn solve(&self, model: &RoutingModel<'_>, parameters: &SearchParameters) -> Option<Assignment> {
        if !model.is_ready() {
            return None;
        }

        let deadline = Instant::now() + parameters.time_limit();
        let costs = ArcCosts::from_model(model);
        let depot = model.depot();

        let mut route = match parameters.first_solution_strategy {
            FirstSolutionStrategy::PathCheapestArc => path_cheapest_arc(&costs, depot),
            FirstSolutionStrategy::Sequential => sequential(costs.n, depot),
        };
        debug!(
            nodes = costs.n,
            cost = costs.route_cost(&route),
            "built first solution"
        );

        if costs.n > 1 {
            route = improve(&costs, route, parameters, deadline);
        }

        // The closing depot is implied by the end of the assignment.
        route.pop();
        Assignment::from_route(costs.n, &route)
    }
}

/// Dense copy of the model's transit costs.
struct ArcCosts {
    n: usize,
    values: Vec<i64>,
}

impl ArcCosts {
    fn from_model(model: &RoutingModel<'_>) -> Self {
        let n = model.node_count();
        let mut values = Vec::with_capacity(n * n);
        for from in 0..n {
            for to in 0..n {
                values.push(model.transit_cost(from, to));
            }
        }
        Self { n, values }
    }

    fn get(&self, from: usize, to: usize) -> i64 {
        self.values[from * self.n + to]
    }

    fn route_cost(&self, route: &[usize]) -> i64 {
        route
            .windows(2)
            .fold(0i64, |total, arc| total.saturating_add(self.get(arc[0], arc[1])))
    }
}

/// Closed route `[depot, ..., depot]` grown along the cheapest outgoing arc.
fn path_cheapest_arc(costs: &ArcCosts, depot: usize) -> Vec<usize> {
    let mut visited = vec![false; costs.n];
    visited[depot] = true;
    let mut route = Vec::with_capacity(costs.n + 1);
    route.push(depot);

    let mut current = depot;
    while let Some(next) = (0..costs.n)
        .filter(|node| !visited[*node])
        .min_by_key(|node| (costs.get(current, *node), *node))
    {
        visited[next] = true;
        route.push(next);
        current = next;
    }

    route.push(depot);
    route
}

fn sequential(n: usize, depot: usize) -> Vec<usize> {
    let mut route = Vec::with_capacity(n + 1);
    route.push(depot);
    route.extend((0..n).filter(|node| *node != depot));
    route.push(depot);
    route
}

fn improve(
    costs: &ArcCosts,
    mut route: Vec<usize>,
    parameters: &SearchParameters,
    deadline: Instant,
) -> Vec<usize> {
    let mut search = PenalizedSearch::new(costs);
    let mut best = route.clone();
    let mut best_cost = costs.route_cost(&best);
    let guided = parameters.local_search_metaheuristic
        == LocalSearchMetaheuristic::GuidedLocalSearch
        && costs.n > TRIVIAL_NODE_COUNT;

    for round in 0..parameters.max_rounds.max(1) {
        let converged = search.descend(&mut route, deadline);

        let cost = costs.route_cost(&route);
        if cost < best_cost {
            debug!(round, cost, "improved tour");
            best_cost = cost;
            best.clone_from(&route);
        }

        if !converged || !guided || Instant::now() >= deadline {
            break;
        }

        if search.lambda == 0 {
            let arcs = (route.len() - 1) as f64;
            search.lambda = ((PENALTY_COEFFICIENT * cost as f64) / arcs).round().max(1.0) as i64;
        }
        search.penalize(&route);
    }

    best
}

/// Local search over `cost + lambda * penalty`.
struct PenalizedSearch<'c> {
    costs: &'c ArcCosts,
    penalties: Vec<i64>,
    lambda: i64,
}

impl<'c> PenalizedSearch<'c> {
    fn new(costs: &'c ArcCosts) -> Self {
        Self {
            costs,
            penalties: vec![0; costs.n * costs.n],
            lambda: 0,
        }
    }

    fn arc(&self, from: usize, to: usize) -> i64 {
        self.costs
            .get(from, to)
            .saturating_add(self.lambda.saturating_mul(self.penalties[from * self.costs.n + to]))
    }

    /// Apply improving moves until none is left. Returns false if the
    /// deadline cut the descent short.
    fn descend(&self, route: &mut [usize], deadline: Instant) -> bool {
        loop {
            if Instant::now() >= deadline {
                return false;
            }
            if self.two_opt_improve(route) || self.relocate_improve(route) {
                continue;
            }
            return true;
        }
    }

    /// 2-opt: reverse the segment `route[i..=j]`. Costs are directional, so
    /// both the forward and the reversed segment are summed.
    fn two_opt_improve(&self, route: &mut [usize]) -> bool {
        let last = route.len() - 1;
        for i in 1..last.saturating_sub(1) {
            let mut forward = 0;
            let mut backward = 0;
            for j in i + 1..last {
                forward += self.arc(route[j - 1], route[j]);
                backward += self.arc(route[j], route[j - 1]);

                let before =
                    self.arc(route[i - 1], route[i]) + forward + self.arc(route[j], route[j + 1]);
                let after =
                    self.arc(route[i - 1], route[j]) + backward + self.arc(route[i], route[j + 1]);
                if after < before {
                    route[i..=j].reverse();
                    return true;
                }
            }
        }
        false
    }

    /// Relocate: move one node between two other consecutive nodes.
    fn relocate_improve(&self, route: &mut [usize]) -> bool {
        let last = route.len() - 1;
        for i in 1..last {
            let node = route[i];
            let removal_gain = self.arc(route[i - 1], node) + self.arc(node, route[i + 1])
                - self.arc(route[i - 1], route[i + 1]);

            for k in 0..last {
                if k + 1 == i || k == i {
                    continue;
                }
                let (a, b) = (route[k], route[k + 1]);
                let insertion = self.arc(a, node) + self.arc(node, b) - self.arc(a, b);
                if insertion < removal_gain {
                    if k < i {
                        route[k + 1..=i].rotate_right(1);
                    } else {
                        route[i..=k].rotate_left(1);
                    }
                    return true;
                }
            }
        }
        false
    }

    /// Penalize the arcs of `route` with the highest cost-to-penalty utility.
    fn penalize(&mut self, route: &[usize]) {
        let n = self.costs.n;
        let utility = |from: usize, to: usize| {
            self.costs.get(from, to) as f64 / (1 + self.penalties[from * n + to]) as f64
        };

        let max_utility = route
            .windows(2)
            .map(|arc| utility(arc[0], arc[1]))
            .fold(f64::MIN, f64::max);
        let chosen: Vec<usize> = route
            .windows(2)
            .filter(|arc| utility(arc[0], arc[1]) >= max_utility)
            .map(|arc| arc[0] * n + arc[1])
            .collect();

        for cell in chosen {
            self.penalties[cell] += 1;
        }
    }
}
