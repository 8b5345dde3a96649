//! Precomputed distance tables on disk.
//!
//! A table is a CSV file whose header row and first column both carry stop
//! ids; the top-left cell is ignored. Cells are metres. An empty cell means
//! the pair is unreachable.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::PlannerError;
use crate::matrix::{DistanceMatrix, UNREACHABLE_DISTANCE, round_meters};
use crate::stop::{Stop, StopId};
use crate::traits::DistanceMatrixProvider;

/// Parse a row or column label as a stop id.
///
/// Labels are compared after normalization: surrounding whitespace and a
/// byte-order mark are dropped, and integral floats such as `"12.0"` are
/// accepted, since spreadsheet exports often write ids that way.
pub fn normalize_label(label: &str) -> Option<StopId> {
    let label = label.trim_start_matches('\u{feff}').trim();
    if let Ok(id) = label.parse::<StopId>() {
        return Some(id);
    }
    let value = label.parse::<f64>().ok()?;
    (value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64)
        .then_some(value as StopId)
}

/// Read a labelled table into a [`DistanceMatrix`] in row-label order.
///
/// Columns may be listed in any order, but their label set must equal the
/// row label set.
pub fn read_table(reader: impl Read, origin: &str) -> Result<DistanceMatrix, PlannerError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv
        .headers()
        .map_err(|err| PlannerError::malformed(origin, err.to_string()))?
        .clone();
    let columns = headers
        .iter()
        .skip(1)
        .map(|label| {
            normalize_label(label).ok_or_else(|| {
                PlannerError::malformed(origin, format!("column label {:?} is not a stop id", label))
            })
        })
        .collect::<Result<Vec<StopId>, _>>()?;

    let mut order = Vec::with_capacity(columns.len());
    let mut rows = Vec::with_capacity(columns.len());
    let mut blanks = 0usize;

    for record in csv.records() {
        let record = record.map_err(|err| PlannerError::malformed(origin, err.to_string()))?;
        let mut fields = record.iter();
        let label = fields.next().unwrap_or_default();
        let id = normalize_label(label).ok_or_else(|| {
            PlannerError::malformed(origin, format!("row label {:?} is not a stop id", label))
        })?;
        if record.len() != columns.len() + 1 {
            return Err(PlannerError::malformed(
                origin,
                format!(
                    "row {} has {} cells, expected {}",
                    id,
                    record.len().saturating_sub(1),
                    columns.len()
                ),
            ));
        }

        let row = fields
            .map(|cell| {
                if cell.is_empty() {
                    blanks += 1;
                    return Ok(UNREACHABLE_DISTANCE);
                }
                cell.parse::<f64>()
                    .ok()
                    .and_then(round_meters)
                    .ok_or_else(|| {
                        PlannerError::malformed(
                            origin,
                            format!("row {} has invalid distance {:?}", id, cell),
                        )
                    })
            })
            .collect::<Result<Vec<i64>, _>>()?;

        order.push(id);
        rows.push(row);
    }

    if order.is_empty() {
        return Err(PlannerError::malformed(origin, "table has no rows"));
    }
    if blanks > 0 {
        warn!(origin, cells = blanks, "blank table cells treated as unreachable");
    }

    let cells = align_columns(origin, &order, &columns, rows)?;
    DistanceMatrix::with_origin(origin, order, cells)
}

/// Reorder every row so column `j` refers to `order[j]`.
fn align_columns(
    origin: &str,
    order: &[StopId],
    columns: &[StopId],
    rows: Vec<Vec<i64>>,
) -> Result<Vec<Vec<i64>>, PlannerError> {
    if columns == order {
        return Ok(rows);
    }

    let mut sorted_rows = order.to_vec();
    let mut sorted_columns = columns.to_vec();
    sorted_rows.sort_unstable();
    sorted_columns.sort_unstable();
    if sorted_rows != sorted_columns {
        return Err(PlannerError::malformed(
            origin,
            "row labels and column labels differ",
        ));
    }

    let source: Vec<usize> = order
        .iter()
        .map(|id| columns.iter().position(|column| column == id).unwrap_or_default())
        .collect();
    Ok(rows
        .into_iter()
        .map(|row| source.iter().map(|&j| row[j]).collect())
        .collect())
}

/// Open and parse the table at `path`.
pub fn load_table(path: &Path) -> Result<DistanceMatrix, PlannerError> {
    let file = File::open(path).map_err(|err| PlannerError::MatrixNotFound {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    let matrix = read_table(file, &path.display().to_string())?;
    debug!(path = %path.display(), nodes = matrix.len(), "loaded distance table");
    Ok(matrix)
}

/// A loaded table serving as a [`DistanceMatrixProvider`].
///
/// Stops are looked up by id only; their coordinates are ignored. Clones
/// share the loaded matrix.
#[derive(Debug, Clone)]
pub struct TableMatrix {
    matrix: Arc<DistanceMatrix>,
}

impl TableMatrix {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlannerError> {
        let matrix = Arc::new(load_table(path.as_ref())?);
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &DistanceMatrix {
        &self.matrix
    }
}

impl DistanceMatrixProvider for TableMatrix {
    fn matrix_for(&self, stops: &[Stop]) -> Result<DistanceMatrix, PlannerError> {
        if stops.is_empty() {
            return Err(PlannerError::Validation(
                "at least one stop is required".to_string(),
            ));
        }
        let ids: Vec<StopId> = stops.iter().map(|stop| stop.id).collect();
        self.matrix.restrict(&ids)
    }
}
