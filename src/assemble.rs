//! Turn a raw solver route into a closed tour of stop ids with leg distances.

use serde::Serialize;

use crate::error::PlannerError;
use crate::matrix::DistanceMatrix;
use crate::stop::StopId;

/// A closed tour: starts and ends at the depot.
///
/// `leg_distances[i]` is the distance from `order_ids[i]` to
/// `order_ids[i + 1]` and `total_distance` is their sum. Serializes to the
/// wire shape `{order_ids, total_distance_m, legs_m}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tour {
    order_ids: Vec<StopId>,
    #[serde(rename = "total_distance_m")]
    total_distance: i64,
    #[serde(rename = "legs_m")]
    leg_distances: Vec<i64>,
}

impl Tour {
    /// A tour that never leaves the depot. Also the result of an infeasible
    /// solve.
    pub fn depot_only(depot_id: StopId) -> Self {
        Self {
            order_ids: vec![depot_id],
            total_distance: 0,
            leg_distances: Vec::new(),
        }
    }

    pub fn order_ids(&self) -> &[StopId] {
        &self.order_ids
    }

    pub fn leg_distances(&self) -> &[i64] {
        &self.leg_distances
    }

    pub fn total_distance(&self) -> i64 {
        self.total_distance
    }

    pub fn depot_id(&self) -> StopId {
        self.order_ids[0]
    }

    /// Number of stops visited besides the depot.
    pub fn stop_count(&self) -> usize {
        self.order_ids.len().saturating_sub(2)
    }
}

/// Build a [`Tour`] from solver positions over `matrix`.
///
/// The depot is appended (with its closing leg) unless `raw` already ends
/// there. Every leg is read from `matrix`, the same matrix the solver used.
pub fn assemble(
    raw: &[usize],
    matrix: &DistanceMatrix,
    depot_id: StopId,
) -> Result<Tour, PlannerError> {
    let depot = matrix
        .position(depot_id)
        .ok_or(PlannerError::DepotNotFound(depot_id))?;

    let Some(&first) = raw.first() else {
        return Ok(Tour::depot_only(depot_id));
    };
    if first != depot {
        return Err(PlannerError::Validation(format!(
            "tour starts at position {} instead of depot {}",
            first, depot_id
        )));
    }
    if let Some(position) = raw.iter().find(|position| **position >= matrix.len()) {
        return Err(PlannerError::Validation(format!(
            "tour position {} is outside a {}-node matrix",
            position,
            matrix.len()
        )));
    }

    let mut positions = raw.to_vec();
    if positions.last() != Some(&depot) {
        positions.push(depot);
    }

    let order = matrix.order();
    let order_ids = positions.iter().map(|&position| order[position]).collect();
    let leg_distances: Vec<i64> = positions
        .windows(2)
        .map(|leg| matrix.distance(leg[0], leg[1]))
        .collect();
    let total_distance = leg_distances
        .iter()
        .fold(0i64, |total, leg| total.saturating_add(*leg));

    Ok(Tour {
        order_ids,
        total_distance,
        leg_distances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::UNREACHABLE_DISTANCE;

    fn matrix() -> DistanceMatrix {
        DistanceMatrix::new(
            vec![0, 1, 2, 3],
            vec![
                vec![0, 10, 15, 20],
                vec![5, 0, 9, 10],
                vec![6, 13, 0, 12],
                vec![8, 8, 9, 0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn appends_closing_leg() {
        let tour = assemble(&[0, 2, 3, 1], &matrix(), 0).unwrap();
        assert_eq!(tour.order_ids().to_vec(), vec![0, 2, 3, 1, 0]);
        assert_eq!(tour.leg_distances().to_vec(), vec![15, 12, 8, 5]);
        assert_eq!(tour.total_distance(), 40);
        assert_eq!(tour.stop_count(), 3);
    }

    #[test]
    fn already_closed_route_is_not_closed_twice() {
        let tour = assemble(&[0, 1, 3, 2, 0], &matrix(), 0).unwrap();
        assert_eq!(tour.order_ids().to_vec(), vec![0, 1, 3, 2, 0]);
        assert_eq!(tour.total_distance(), 10 + 10 + 9 + 6);
    }

    #[test]
    fn depot_only_route() {
        let tour = assemble(&[0], &matrix(), 0).unwrap();
        assert_eq!(tour, Tour::depot_only(0));
        assert!(tour.leg_distances().is_empty());
        assert_eq!(tour.total_distance(), 0);

        assert_eq!(assemble(&[], &matrix(), 3).unwrap(), Tour::depot_only(3));
    }

    #[test]
    fn unreachable_legs_sum_without_overflow() {
        let u = UNREACHABLE_DISTANCE;
        let matrix = DistanceMatrix::new(
            vec![4, 5, 6],
            vec![vec![0, u, u], vec![u, 0, u], vec![u, u, 0]],
        )
        .unwrap();

        let tour = assemble(&[0, 1, 2], &matrix, 4).unwrap();
        assert_eq!(tour.total_distance(), 3 * u);
    }

    #[test]
    fn uses_directional_entries() {
        let forward = assemble(&[1, 2], &matrix(), 1).unwrap();
        assert_eq!(forward.leg_distances().to_vec(), vec![9, 13]);
        assert_eq!(forward.total_distance(), 22);
    }

    #[test]
    fn rejects_route_not_starting_at_depot() {
        let err = assemble(&[1, 0], &matrix(), 0).unwrap_err();
        assert!(matches!(err, PlannerError::Validation(_)));
    }

    #[test]
    fn rejects_unknown_depot() {
        let err = assemble(&[0], &matrix(), 9).unwrap_err();
        assert_eq!(err, PlannerError::DepotNotFound(9));
    }

    #[test]
    fn serializes_wire_shape() {
        let tour = assemble(&[0, 1], &matrix(), 0).unwrap();
        let value = serde_json::to_value(&tour).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "order_ids": [0, 1, 0],
                "total_distance_m": 15,
                "legs_m": [10, 5],
            })
        );
    }
}
