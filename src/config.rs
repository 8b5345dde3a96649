//! Batch configuration: the distance service, solver budget and the routes
//! to plan.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::engine::SearchParameters;
use crate::osrm::OsrmConfig;
use crate::planner::{MatrixSource, RouteSpec};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub osrm: OsrmConfig,
    #[serde(default)]
    pub search: SearchParameters,
    /// Routes solved concurrently; `None` uses available parallelism.
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Most stops a route may select besides its depot.
    #[serde(default)]
    pub max_selected: Option<usize>,
    pub routes: Vec<RouteSpec>,
}

impl PlannerConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a config file. Relative table and catalog paths are taken
    /// relative to the file's directory.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for route in &mut self.routes {
            match &mut route.source {
                MatrixSource::File(path) | MatrixSource::Catalog { path, .. } => {
                    if path.is_relative() {
                        *path = base.join(&*path);
                    }
                }
                MatrixSource::Stops(_) => {}
            }
        }
    }
}
