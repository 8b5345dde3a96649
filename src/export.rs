//! CSV export of a tour, one row per visit.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::assemble::Tour;
use crate::stop::{Stop, StopId};

#[derive(Debug, Serialize)]
struct TourRow<'a> {
    order: usize,
    stop_id: StopId,
    raw_address: Option<&'a str>,
    final_address: Option<&'a str>,
    lat: Option<f64>,
    lon: Option<f64>,
    /// Distance from the previous row, zero on the first.
    leg_m: i64,
    cum_m: i64,
}

/// Write `tour` as CSV with a header row.
///
/// Addresses and coordinates come from `stops`; visits with no matching
/// stop leave those columns blank. Distances are the tour's own legs.
pub fn write_tour_csv<W: Write>(writer: W, tour: &Tour, stops: &[Stop]) -> Result<(), csv::Error> {
    let by_id: HashMap<StopId, &Stop> = stops.iter().map(|stop| (stop.id, stop)).collect();
    let mut csv = csv::Writer::from_writer(writer);

    let mut cumulative = 0;
    for (i, &stop_id) in tour.order_ids().iter().enumerate() {
        let leg = if i == 0 { 0 } else { tour.leg_distances()[i - 1] };
        cumulative += leg;

        let stop = by_id.get(&stop_id);
        csv.serialize(TourRow {
            order: i + 1,
            stop_id,
            raw_address: stop.and_then(|s| s.raw_address.as_deref()),
            final_address: stop.and_then(|s| s.display_address.as_deref()),
            lat: stop.map(|s| s.latitude),
            lon: stop.map(|s| s.longitude),
            leg_m: leg,
            cum_m: cumulative,
        })?;
    }

    csv.flush()?;
    Ok(())
}

/// File name for a route's CSV, `route_<name>.csv`.
///
/// Characters other than ASCII letters, digits, `-` and `_` become `_`, so
/// a route name can never point outside the export directory.
pub fn tour_file_name(route: &str) -> String {
    let safe: String = route
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("route_{}.csv", safe)
}

/// Write `tour` into `dir` under [`tour_file_name`] and return the path.
pub fn write_tour_file(
    dir: &Path,
    route: &str,
    tour: &Tour,
    stops: &[Stop],
) -> Result<PathBuf, csv::Error> {
    let path = dir.join(tour_file_name(route));
    let file = File::create(&path)?;
    write_tour_csv(file, tour, stops)?;
    Ok(path)
}
