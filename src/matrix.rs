//! Directional distance matrix keyed by stop id.

use std::collections::HashMap;

use crate::error::PlannerError;
use crate::stop::StopId;

/// Distance substituted for pairs the road network cannot connect.
///
/// Large enough that the solver only uses such an arc when nothing else is
/// possible, small enough that a full tour of them cannot overflow `i64`.
pub const UNREACHABLE_DISTANCE: i64 = 1_000_000_000;

/// Round a raw distance to whole metres, capped at [`UNREACHABLE_DISTANCE`].
///
/// Returns `None` for values that are not a usable distance (negative, NaN
/// or infinite); callers decide whether that means unreachable or malformed.
pub fn round_meters(value: f64) -> Option<i64> {
    if value.is_finite() && value >= 0.0 {
        Some(value.round().min(UNREACHABLE_DISTANCE as f64) as i64)
    } else {
        None
    }
}

/// An n x n matrix of directional distances in metres.
///
/// `order[i]` is the stop id of row and column `i`. The matrix is not
/// assumed to be symmetric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMatrix {
    order: Vec<StopId>,
    cells: Vec<Vec<i64>>,
    index: HashMap<StopId, usize>,
}

impl DistanceMatrix {
    /// Build a matrix, checking shape, id uniqueness, a zero diagonal and
    /// cells within `0..=UNREACHABLE_DISTANCE`.
    pub fn new(order: Vec<StopId>, cells: Vec<Vec<i64>>) -> Result<Self, PlannerError> {
        Self::with_origin("matrix", order, cells)
    }

    pub(crate) fn with_origin(
        origin: &str,
        order: Vec<StopId>,
        cells: Vec<Vec<i64>>,
    ) -> Result<Self, PlannerError> {
        let n = order.len();
        if cells.len() != n {
            return Err(PlannerError::malformed(
                origin,
                format!("{} ids but {} rows", n, cells.len()),
            ));
        }

        let mut index = HashMap::with_capacity(n);
        for (position, &id) in order.iter().enumerate() {
            if index.insert(id, position).is_some() {
                return Err(PlannerError::malformed(origin, format!("duplicate id {}", id)));
            }
        }

        for (i, row) in cells.iter().enumerate() {
            if row.len() != n {
                return Err(PlannerError::malformed(
                    origin,
                    format!("row {} has {} cells, expected {}", order[i], row.len(), n),
                ));
            }
            if let Some(value) = row.iter().find(|value| **value < 0) {
                return Err(PlannerError::malformed(
                    origin,
                    format!("row {} has negative distance {}", order[i], value),
                ));
            }
            if let Some(value) = row.iter().find(|value| **value > UNREACHABLE_DISTANCE) {
                return Err(PlannerError::malformed(
                    origin,
                    format!("row {} has distance {} beyond the unreachable cap", order[i], value),
                ));
            }
            if row[i] != 0 {
                return Err(PlannerError::malformed(
                    origin,
                    format!("distance from {} to itself is {}", order[i], row[i]),
                ));
            }
        }

        Ok(Self {
            order,
            cells,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Stop ids in row/column order.
    pub fn order(&self) -> &[StopId] {
        &self.order
    }

    pub fn cells(&self) -> &[Vec<i64>] {
        &self.cells
    }

    pub fn position(&self, id: StopId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn contains(&self, id: StopId) -> bool {
        self.index.contains_key(&id)
    }

    /// Distance between two positions.
    ///
    /// # Panics
    ///
    /// Panics if either position is out of bounds.
    pub fn distance(&self, from: usize, to: usize) -> i64 {
        self.cells[from][to]
    }

    /// Distance between two stop ids, if both are present.
    pub fn distance_between(&self, from: StopId, to: StopId) -> Option<i64> {
        Some(self.cells[self.position(from)?][self.position(to)?])
    }

    /// Number of off-diagonal cells carrying [`UNREACHABLE_DISTANCE`].
    pub fn unreachable_cells(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|value| **value >= UNREACHABLE_DISTANCE)
            .count()
    }

    /// The sub-matrix induced by `ids`, in the order given.
    ///
    /// Fails with every id the matrix does not carry. `ids` must not repeat.
    pub fn restrict(&self, ids: &[StopId]) -> Result<DistanceMatrix, PlannerError> {
        let missing: Vec<StopId> = ids.iter().copied().filter(|id| !self.contains(*id)).collect();
        if !missing.is_empty() {
            return Err(PlannerError::UnknownIds { ids: missing });
        }

        let positions: Vec<usize> = ids.iter().map(|id| self.index[id]).collect();
        let cells = positions
            .iter()
            .map(|&from| positions.iter().map(|&to| self.cells[from][to]).collect())
            .collect();

        DistanceMatrix::new(ids.to_vec(), cells)
    }
}
