//! Haversine distance matrix provider (fallback when OSRM unavailable).
//!
//! Great-circle metres, optionally stretched by a detour factor. Ignores
//! roads, so tours are only as good as the straight-line approximation.

use crate::error::PlannerError;
use crate::matrix::{DistanceMatrix, UNREACHABLE_DISTANCE, round_meters};
use crate::stop::Stop;
use crate::traits::DistanceMatrixProvider;

/// Mean Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Straight-line distance matrix provider.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Multiplier applied to every great-circle distance, e.g. 1.3 to
    /// approximate urban road detours.
    pub detour_factor: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self { detour_factor: 1.0 }
    }
}

impl HaversineMatrix {
    pub fn new(detour_factor: f64) -> Self {
        Self { detour_factor }
    }

    /// Great-circle distance between two `(lat, lng)` points in metres.
    pub fn haversine_m(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_M * c
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, stops: &[Stop]) -> Result<DistanceMatrix, PlannerError> {
        if stops.is_empty() {
            return Err(PlannerError::Validation(
                "at least one stop is required".to_string(),
            ));
        }
        if !self.detour_factor.is_finite() || self.detour_factor <= 0.0 {
            return Err(PlannerError::Validation(format!(
                "detour factor must be positive, got {}",
                self.detour_factor
            )));
        }

        let n = stops.len();
        let mut cells = vec![vec![0; n]; n];

        for (i, from) in stops.iter().enumerate() {
            for (j, to) in stops.iter().enumerate() {
                if i != j {
                    let meters = Self::haversine_m(from.location(), to.location());
                    cells[i][j] = round_meters(meters * self.detour_factor)
                        .unwrap_or(UNREACHABLE_DISTANCE);
                }
            }
        }

        let order = stops.iter().map(|stop| stop.id).collect();
        DistanceMatrix::with_origin("from haversine estimate", order, cells)
    }
}
