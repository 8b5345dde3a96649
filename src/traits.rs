//! Seams between the route pipeline and its external collaborators.
//!
//! Both are intentionally minimal: a source of distances and an
//! optimization engine. Concrete adapters live in their own modules.

use crate::engine::{Assignment, RoutingModel, SearchParameters};
use crate::error::PlannerError;
use crate::matrix::DistanceMatrix;
use crate::stop::Stop;

/// Provides a distance matrix for a set of stops.
///
/// The matrix is indexed by the provided stop order: `order()[i]` is
/// `stops[i].id`.
pub trait DistanceMatrixProvider {
    fn matrix_for(&self, stops: &[Stop]) -> Result<DistanceMatrix, PlannerError>;
}

impl<T: DistanceMatrixProvider + ?Sized> DistanceMatrixProvider for &T {
    fn matrix_for(&self, stops: &[Stop]) -> Result<DistanceMatrix, PlannerError> {
        (**self).matrix_for(stops)
    }
}

impl<T: DistanceMatrixProvider + ?Sized> DistanceMatrixProvider for Box<T> {
    fn matrix_for(&self, stops: &[Stop]) -> Result<DistanceMatrix, PlannerError> {
        (**self).matrix_for(stops)
    }
}

/// A single-vehicle closed-route optimizer.
///
/// The engine sees node positions only. It reads arc costs through the
/// transit callback registered on the model, starts and ends at the model's
/// depot, and must respect the wall-clock budget in `parameters`.
///
/// Returns `None` when it finds no solution.
pub trait RoutingEngine {
    fn solve(&self, model: &RoutingModel<'_>, parameters: &SearchParameters) -> Option<Assignment>;
}

impl<T: RoutingEngine + ?Sized> RoutingEngine for &T {
    fn solve(&self, model: &RoutingModel<'_>, parameters: &SearchParameters) -> Option<Assignment> {
        (**self).solve(model, parameters)
    }
}
