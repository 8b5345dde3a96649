//! Central Hanoi landmarks (approximate, from OpenStreetMap).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tour_planner::engine::SearchParameters;
use tour_planner::stop::{Stop, StopId};

/// `(id, lat, lng, name, route)`
pub const HANOI_LOCATIONS: &[(StopId, f64, f64, &str, &str)] = &[
    (0, 21.0287, 105.8524, "Hoan Kiem Lake", "Depot"),
    (1, 21.0368, 105.8347, "Ba Dinh Square", "West"),
    (2, 21.0293, 105.8356, "Temple of Literature", "West"),
    (3, 21.0430, 105.8594, "Long Bien Bridge", "North"),
    (4, 21.0479, 105.8368, "Tran Quoc Pagoda", "North"),
    (5, 21.0242, 105.8576, "Hanoi Opera House", "South"),
    (6, 21.0380, 105.8497, "Dong Xuan Market", "North"),
    (7, 21.0245, 105.8412, "Hanoi Railway Station", "West"),
    (8, 20.9958, 105.8680, "Times City", "South"),
    (9, 21.0170, 105.7838, "Keangnam Landmark", "West"),
];

pub const DEPOT: StopId = 0;

pub fn hanoi_stops() -> Vec<Stop> {
    HANOI_LOCATIONS
        .iter()
        .map(|&(id, lat, lng, name, _)| Stop::new(id, lat, lng).with_display_address(name))
        .collect()
}

pub fn hanoi_stops_where(ids: &[StopId]) -> Vec<Stop> {
    hanoi_stops()
        .into_iter()
        .filter(|stop| ids.contains(&stop.id))
        .collect()
}

/// JSONL catalog in the field spelling the address cleaner produces.
pub fn hanoi_catalog() -> String {
    HANOI_LOCATIONS
        .iter()
        .map(|&(id, lat, lng, name, route)| {
            serde_json::json!({
                "atm_id": id,
                "lat": lat,
                "lon": lng,
                "final_address": name,
                "raw_address": name.to_uppercase(),
                "route": route,
            })
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Four-node directional matrix over ids 0..=3.
pub fn directional_cells() -> Vec<Vec<i64>> {
    vec![
        vec![0, 10, 15, 20],
        vec![5, 0, 9, 10],
        vec![6, 13, 0, 12],
        vec![8, 8, 9, 0],
    ]
}

/// Render a labelled CSV table.
pub fn table_csv(ids: &[StopId], cells: &[Vec<i64>]) -> String {
    let mut text = String::from("id");
    for id in ids {
        text.push_str(&format!(",{}", id));
    }
    text.push('\n');
    for (id, row) in ids.iter().zip(cells) {
        text.push_str(&id.to_string());
        for cell in row {
            text.push_str(&format!(",{}", cell));
        }
        text.push('\n');
    }
    text
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture file");
    path
}

/// Short budget so batches of tests stay fast.
pub fn quick_search() -> SearchParameters {
    SearchParameters::default().with_time_limit(Duration::from_millis(100))
}
