//! Stops and the per-solve stop registry.
//!
//! The registry collapses duplicate ids and fixes the canonical node order
//! used by every later stage of a route pipeline.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlannerError;

/// External stop identifier.
pub type StopId = i64;

/// A geographic stop to be visited.
///
/// Accepts both the long field names and the short `atm_id`/`lat`/`lon`
/// spelling used by stop catalogs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(alias = "atm_id")]
    pub id: StopId,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
    #[serde(default, alias = "final_address", skip_serializing_if = "Option::is_none")]
    pub display_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_address: Option<String>,
}

impl Stop {
    pub fn new(id: StopId, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            latitude,
            longitude,
            display_address: None,
            raw_address: None,
        }
    }

    pub fn with_display_address(mut self, address: impl Into<String>) -> Self {
        self.display_address = Some(address.into());
        self
    }

    pub fn with_raw_address(mut self, address: impl Into<String>) -> Self {
        self.raw_address = Some(address.into());
        self
    }

    /// Location as (lat, lng).
    pub fn location(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    fn has_valid_location(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Deduplicated stops in first-occurrence order with an id -> position index.
#[derive(Debug, Clone)]
pub struct StopRegistry {
    stops: Vec<Stop>,
    index: HashMap<StopId, usize>,
}

impl StopRegistry {
    /// Register `stops`, collapsing duplicate ids.
    ///
    /// A repeated id keeps the position of its first occurrence and the
    /// attributes of its last one.
    pub fn register(stops: impl IntoIterator<Item = Stop>) -> Result<Self, PlannerError> {
        let mut unique: Vec<Stop> = Vec::new();
        let mut index: HashMap<StopId, usize> = HashMap::new();

        for stop in stops {
            if !stop.has_valid_location() {
                return Err(PlannerError::Validation(format!(
                    "stop {} has invalid coordinates ({}, {})",
                    stop.id, stop.latitude, stop.longitude
                )));
            }
            match index.get(&stop.id) {
                Some(&position) => unique[position] = stop,
                None => {
                    index.insert(stop.id, unique.len());
                    unique.push(stop);
                }
            }
        }

        if unique.is_empty() {
            return Err(PlannerError::Validation(
                "at least one stop is required".to_string(),
            ));
        }

        debug!(stops = unique.len(), "registered stops");
        Ok(Self {
            stops: unique,
            index,
        })
    }

    /// Position of the depot in the canonical order.
    ///
    /// Run this before any distance query so a bad depot never costs an
    /// upstream call.
    pub fn require_depot(&self, depot_id: StopId) -> Result<usize, PlannerError> {
        self.position(depot_id)
            .ok_or(PlannerError::DepotNotFound(depot_id))
    }

    pub fn position(&self, id: StopId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get(&self, id: StopId) -> Option<&Stop> {
        self.position(id).map(|position| &self.stops[position])
    }

    pub fn index(&self) -> &HashMap<StopId, usize> {
        &self.index
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn ordered_ids(&self) -> Vec<StopId> {
        self.stops.iter().map(|stop| stop.id).collect()
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Stops for `ids`, in the order given.
    ///
    /// Fails with every id that is not registered.
    pub fn stops_for(&self, ids: &[StopId]) -> Result<Vec<Stop>, PlannerError> {
        let missing: Vec<StopId> = ids
            .iter()
            .copied()
            .filter(|id| !self.index.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(PlannerError::UnknownIds { ids: missing });
        }
        Ok(ids
            .iter()
            .map(|id| self.stops[self.index[id]].clone())
            .collect())
    }
}

/// One line of a stop catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub stop: Stop,
    /// Named route the stop belongs to, if tagged.
    pub route: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    #[serde(alias = "id")]
    atm_id: StopId,
    lat: f64,
    lon: f64,
    #[serde(default)]
    final_address: Option<String>,
    #[serde(default)]
    raw_address: Option<String>,
    #[serde(default)]
    route: Option<String>,
}

/// Read a JSONL stop catalog.
///
/// Lines that are blank, not JSON, or lack a numeric `lat`/`lon` are skipped.
pub fn parse_catalog(reader: impl BufRead) -> Result<Vec<CatalogEntry>, PlannerError> {
    let mut entries = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| PlannerError::Validation(err.to_string()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<CatalogRecord>(line) {
            Ok(record) => entries.push(CatalogEntry {
                stop: Stop {
                    id: record.atm_id,
                    latitude: record.lat,
                    longitude: record.lon,
                    display_address: record.final_address,
                    raw_address: record.raw_address,
                },
                route: record.route,
            }),
            Err(err) => debug!(line = line_no + 1, %err, "skipping catalog line"),
        }
    }
    Ok(entries)
}

pub fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>, PlannerError> {
    let file = File::open(path).map_err(|err| PlannerError::MatrixNotFound {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    parse_catalog(BufReader::new(file))
}

/// Catalog stops tagged with `route` (all stops when `route` is `None`).
///
/// The depot is always kept, whatever its tag.
pub fn catalog_stops(entries: &[CatalogEntry], route: Option<&str>, depot_id: StopId) -> Vec<Stop> {
    entries
        .iter()
        .filter(|entry| match route {
            None => true,
            Some(name) => entry.stop.id == depot_id || entry.route.as_deref() == Some(name),
        })
        .map(|entry| entry.stop.clone())
        .collect()
}
