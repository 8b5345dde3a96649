//! Narrow a distance matrix to the stops chosen for one route.

use std::collections::HashSet;

use tracing::debug;

use crate::error::PlannerError;
use crate::matrix::DistanceMatrix;
use crate::stop::StopId;

/// `[depot] + selected`, duplicates removed, first occurrence wins.
///
/// The depot is always first, even when it also appears in `selected`.
pub fn working_set(depot_id: StopId, selected: &[StopId]) -> Vec<StopId> {
    let mut seen = HashSet::with_capacity(selected.len() + 1);
    seen.insert(depot_id);
    let mut ids = Vec::with_capacity(selected.len() + 1);
    ids.push(depot_id);
    ids.extend(selected.iter().copied().filter(|id| seen.insert(*id)));
    ids
}

/// Extract the sub-matrix for the depot plus `selected`, in that order.
///
/// The returned matrix has the depot at position 0. Fails with every id of
/// the working set that `matrix` does not carry.
pub fn select(
    matrix: &DistanceMatrix,
    depot_id: StopId,
    selected: &[StopId],
) -> Result<DistanceMatrix, PlannerError> {
    let ids = working_set(depot_id, selected);
    let sub = matrix.restrict(&ids)?;
    debug!(
        depot = depot_id,
        requested = selected.len(),
        nodes = sub.len(),
        "selected sub-matrix"
    );
    Ok(sub)
}
