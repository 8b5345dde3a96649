//! tour-planner: closed single-depot tours over road or tabular distances.
//!
//! Stops are registered, measured (OSRM, a CSV table or great-circle
//! estimates), narrowed to a route's selection, solved and assembled into a
//! [`Tour`] of stop ids with per-leg metres.

pub mod assemble;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod haversine;
pub mod matrix;
pub mod osrm;
pub mod planner;
pub mod search;
pub mod solver;
pub mod stop;
pub mod subset;
pub mod table;
pub mod traits;

pub use assemble::Tour;
pub use error::{PlannerError, UpstreamError};
pub use matrix::{DistanceMatrix, UNREACHABLE_DISTANCE};
pub use planner::{CancellationFlag, MatrixSource, Planner, RouteOutcome, RouteSpec};
pub use stop::{Stop, StopId, StopRegistry};
