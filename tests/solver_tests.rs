//! Solver quality and tour invariants
//!
//! Brute-force optima on small directional matrices, sentinel avoidance and
//! engine substitution.

use std::time::Duration;

use rstest::rstest;

use tour_planner::assemble::assemble;
use tour_planner::engine::{
    Assignment, FirstSolutionStrategy, LocalSearchMetaheuristic, RoutingModel, SearchParameters,
};
use tour_planner::matrix::{DistanceMatrix, UNREACHABLE_DISTANCE};
use tour_planner::solver::{SolveOutcome, TourSolver};
use tour_planner::traits::RoutingEngine;

// ============================================================================
// Test Fixtures
// ============================================================================

/// Deterministic asymmetric matrix with cells in 1..=100.
fn scrambled(n: usize, seed: u64) -> DistanceMatrix {
    let mut state = seed;
    let mut next = || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((state >> 33) % 100 + 1) as i64
    };

    let cells = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 0 } else { next() }).collect())
        .collect();
    DistanceMatrix::new((0..n as i64).collect(), cells).unwrap()
}

fn tour_cost(matrix: &DistanceMatrix, route: &[usize]) -> i64 {
    route.windows(2).map(|leg| matrix.distance(leg[0], leg[1])).sum()
}

/// Cheapest closed tour from `depot`, by enumeration.
fn brute_force(matrix: &DistanceMatrix, depot: usize) -> i64 {
    fn permute(
        matrix: &DistanceMatrix,
        depot: usize,
        route: &mut Vec<usize>,
        remaining: &mut Vec<usize>,
        best: &mut i64,
    ) {
        if remaining.is_empty() {
            route.push(depot);
            *best = (*best).min(tour_cost(matrix, route));
            route.pop();
            return;
        }
        for k in 0..remaining.len() {
            let node = remaining.remove(k);
            route.push(node);
            permute(matrix, depot, route, remaining, best);
            route.pop();
            remaining.insert(k, node);
        }
    }

    let mut remaining: Vec<usize> = (0..matrix.len()).filter(|node| *node != depot).collect();
    let mut best = i64::MAX;
    permute(matrix, depot, &mut vec![depot], &mut remaining, &mut best);
    best
}

fn solved(solver: &TourSolver, matrix: &DistanceMatrix, depot: usize) -> Vec<usize> {
    match solver.solve(matrix, depot) {
        SolveOutcome::Route(route) => route,
        SolveOutcome::Infeasible => panic!("expected a route"),
    }
}

fn budget(ms: u64) -> SearchParameters {
    SearchParameters::default().with_time_limit(Duration::from_millis(ms))
}

// ============================================================================
// Tests
// ============================================================================

#[rstest]
#[case(4, 1)]
#[case(5, 7)]
#[case(6, 42)]
#[case(6, 2024)]
fn guided_search_matches_brute_force(#[case] n: usize, #[case] seed: u64) {
    let matrix = scrambled(n, seed);
    let solver = TourSolver::with_parameters(budget(300));

    let raw = solved(&solver, &matrix, 0);
    let tour = assemble(&raw, &matrix, 0).unwrap();

    assert_eq!(tour.total_distance(), brute_force(&matrix, 0));
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(7)]
#[case(12)]
fn every_node_is_visited_once(#[case] n: usize) {
    let matrix = scrambled(n, n as u64);
    let depot = n / 2;
    let solver = TourSolver::with_parameters(budget(50));

    let raw = solved(&solver, &matrix, depot);
    let tour = assemble(&raw, &matrix, depot as i64).unwrap();

    let ids = tour.order_ids();
    assert_eq!(ids[0], depot as i64);
    assert_eq!(*ids.last().unwrap(), depot as i64);
    let mut inner = ids[..ids.len() - 1].to_vec();
    inner.sort_unstable();
    assert_eq!(inner, (0..n as i64).collect::<Vec<_>>());
}

#[test]
fn greedy_descent_never_beats_guided_search() {
    let matrix = scrambled(9, 99);
    let greedy = TourSolver::with_parameters(
        budget(200).with_metaheuristic(LocalSearchMetaheuristic::GreedyDescent),
    );
    let guided = TourSolver::with_parameters(budget(200));

    let greedy_cost = tour_cost(&matrix, &{
        let mut route = solved(&greedy, &matrix, 0);
        route.push(0);
        route
    });
    let guided_cost = tour_cost(&matrix, &{
        let mut route = solved(&guided, &matrix, 0);
        route.push(0);
        route
    });

    assert!(guided_cost <= greedy_cost, "{guided_cost} > {greedy_cost}");
}

#[test]
fn sequential_start_is_still_improved() {
    let matrix = scrambled(6, 5);
    let solver = TourSolver::with_parameters(
        budget(300).with_first_solution_strategy(FirstSolutionStrategy::Sequential),
    );

    let raw = solved(&solver, &matrix, 0);
    let tour = assemble(&raw, &matrix, 0).unwrap();
    assert_eq!(tour.total_distance(), brute_force(&matrix, 0));
}

#[test]
fn sentinel_arcs_are_avoided_when_possible() {
    let u = UNREACHABLE_DISTANCE;
    let matrix = DistanceMatrix::new(
        vec![10, 11, 12, 13, 14],
        vec![
            vec![0, 10, 12, 14, 10],
            vec![10, 0, u, 11, 13],
            vec![12, u, 0, 10, 12],
            vec![14, 11, 10, 0, u],
            vec![10, 13, 12, u, 0],
        ],
    )
    .unwrap();
    let solver = TourSolver::with_parameters(budget(200));

    let raw = solved(&solver, &matrix, 0);
    let tour = assemble(&raw, &matrix, 10).unwrap();

    assert!(tour.total_distance() < u);
    assert_eq!(tour.total_distance(), brute_force(&matrix, 0));
}

#[test]
fn only_sentinel_arcs_still_yield_a_tour() {
    let u = UNREACHABLE_DISTANCE;
    let matrix = DistanceMatrix::new(vec![1, 2], vec![vec![0, u], vec![u, 0]]).unwrap();
    let solver = TourSolver::with_parameters(budget(20));

    let raw = solved(&solver, &matrix, 0);
    let tour = assemble(&raw, &matrix, 1).unwrap();
    assert_eq!(tour.order_ids().to_vec(), vec![1, 2, 1]);
    assert_eq!(tour.total_distance(), 2 * u);
}

#[test]
fn injected_engine_failure_is_infeasible() {
    struct NoSolution;

    impl RoutingEngine for NoSolution {
        fn solve(&self, _: &RoutingModel<'_>, _: &SearchParameters) -> Option<Assignment> {
            None
        }
    }

    let solver = TourSolver::new(NoSolution, SearchParameters::default());
    assert_eq!(solver.solve(&scrambled(3, 1), 0), SolveOutcome::Infeasible);
}

#[test]
fn engine_sees_exact_matrix_costs() {
    struct Recorder(std::sync::Mutex<Vec<i64>>);

    impl RoutingEngine for Recorder {
        fn solve(&self, model: &RoutingModel<'_>, _: &SearchParameters) -> Option<Assignment> {
            let mut seen = self.0.lock().unwrap();
            for from in 0..model.node_count() {
                for to in 0..model.node_count() {
                    seen.push(model.transit_cost(from, to));
                }
            }
            Assignment::from_route(model.node_count(), &[model.depot(), 1])
        }
    }

    let matrix = DistanceMatrix::new(vec![7, 8], vec![vec![0, 3], vec![4, 0]]).unwrap();
    let engine = Recorder(std::sync::Mutex::new(Vec::new()));
    let solver = TourSolver::new(&engine, SearchParameters::default());

    assert_eq!(solver.solve(&matrix, 0), SolveOutcome::Route(vec![0, 1]));
    assert_eq!(*engine.0.lock().unwrap(), vec![0, 3, 4, 0]);
}
