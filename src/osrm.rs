//! OSRM HTTP adapter for road distance matrices.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PlannerError, UpstreamError};
use crate::matrix::{DistanceMatrix, UNREACHABLE_DISTANCE, round_meters};
use crate::stop::Stop;
use crate::traits::DistanceMatrixProvider;

/// Environment variable overriding [`OsrmConfig::base_url`].
pub const OSRM_URL_ENV: &str = "OSRM_URL";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "driving".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl OsrmConfig {
    /// Defaults, with the base URL taken from `OSRM_URL` when set.
    pub fn from_env() -> Self {
        Self::default().with_env_override()
    }

    pub fn with_env_override(mut self) -> Self {
        if let Ok(url) = std::env::var(OSRM_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Table service URL for `stops`, coordinates as `lng,lat`.
    fn table_url(&self, stops: &[Stop]) -> String {
        let coords = stops
            .iter()
            .map(|stop| format!("{:.6},{:.6}", stop.longitude, stop.latitude))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=distance",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords
        )
    }

    fn convert_error(&self, error: &reqwest::Error, url: &str) -> UpstreamError {
        if error.is_timeout() {
            return UpstreamError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.config.timeout_secs,
            };
        }

        if let Some(status) = error.status() {
            return UpstreamError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        if error.is_decode() {
            return UpstreamError::MalformedResponse {
                message: error.to_string(),
            };
        }

        UpstreamError::Unreachable {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrix_for(&self, stops: &[Stop]) -> Result<DistanceMatrix, PlannerError> {
        if stops.is_empty() {
            return Err(PlannerError::Validation(
                "at least one stop is required".to_string(),
            ));
        }

        let url = self.table_url(stops);
        debug!(stops = stops.len(), %url, "requesting OSRM table");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| self.convert_error(&err, &url))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(UpstreamError::Status {
                url,
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let body = response
            .json::<TableResponse>()
            .map_err(|err| self.convert_error(&err, &url))?;

        convert_response(stops, body)
    }
}

/// OSRM Table service response.
#[derive(Debug, Deserialize)]
pub(crate) struct TableResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    /// Metres between coordinate pairs, `None` where no route exists.
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f64>>>>,
}

/// Shape-check the table and substitute [`UNREACHABLE_DISTANCE`] for
/// missing cells.
pub(crate) fn convert_response(
    stops: &[Stop],
    response: TableResponse,
) -> Result<DistanceMatrix, PlannerError> {
    if response.code != "Ok" {
        return Err(UpstreamError::Service {
            code: response.code,
            message: response.message.unwrap_or_default(),
        }
        .into());
    }

    let distances = response
        .distances
        .ok_or_else(|| UpstreamError::MalformedResponse {
            message: "response carries no distances; was annotations=distance honoured?"
                .to_string(),
        })?;

    let n = stops.len();
    if distances.len() != n || distances.iter().any(|row| row.len() != n) {
        return Err(UpstreamError::MalformedResponse {
            message: format!("expected a {n}x{n} distance table"),
        }
        .into());
    }

    let mut unreachable = 0usize;
    let cells: Vec<Vec<i64>> = distances
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            row.into_iter()
                .enumerate()
                .map(|(j, cell)| {
                    if i == j {
                        return 0;
                    }
                    cell.and_then(round_meters).unwrap_or_else(|| {
                        unreachable += 1;
                        UNREACHABLE_DISTANCE
                    })
                })
                .collect()
        })
        .collect();

    if unreachable > 0 {
        warn!(
            cells = unreachable,
            "OSRM reported unreachable pairs; using sentinel distance"
        );
    }

    let order = stops.iter().map(|stop| stop.id).collect();
    DistanceMatrix::with_origin("from OSRM table", order, cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops() -> Vec<Stop> {
        vec![Stop::new(1, 21.0, 105.8), Stop::new(2, 21.1, 105.9)]
    }

    fn response(json: &str) -> TableResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn table_url_uses_lng_lat_and_distance_annotation() {
        let client = OsrmClient::new(OsrmConfig {
            base_url: "http://osrm.example.com/".to_string(),
            ..OsrmConfig::default()
        })
        .unwrap();

        assert_eq!(
            client.table_url(&stops()),
            "http://osrm.example.com/table/v1/driving/105.800000,21.000000;105.900000,21.100000?annotations=distance"
        );
    }

    #[test]
    fn converts_and_rounds_distances() {
        let matrix = convert_response(
            &stops(),
            response(r#"{"code": "Ok", "distances": [[0.0, 1200.5], [980.4, 0.0]]}"#),
        )
        .unwrap();

        assert_eq!(matrix.order().to_vec(), vec![1, 2]);
        assert_eq!(matrix.distance_between(1, 2), Some(1201));
        assert_eq!(matrix.distance_between(2, 1), Some(980));
    }

    #[test]
    fn null_cells_become_sentinel() {
        let matrix = convert_response(
            &stops(),
            response(r#"{"code": "Ok", "distances": [[0.0, null], [5.0, null]]}"#),
        )
        .unwrap();

        assert_eq!(matrix.distance(0, 1), UNREACHABLE_DISTANCE);
        assert_eq!(matrix.distance(1, 1), 0);
        assert_eq!(matrix.unreachable_cells(), 1);
    }

    #[test]
    fn service_error_code_is_reported() {
        let err = convert_response(
            &stops(),
            response(r#"{"code": "InvalidQuery", "message": "Query string malformed"}"#),
        )
        .unwrap_err();

        assert_eq!(
            err,
            PlannerError::Upstream(UpstreamError::Service {
                code: "InvalidQuery".to_string(),
                message: "Query string malformed".to_string(),
            })
        );
    }

    #[test]
    fn missing_distances_are_malformed() {
        let err = convert_response(
            &stops(),
            response(r#"{"code": "Ok", "durations": [[0.0, 1.0], [1.0, 0.0]]}"#),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            PlannerError::Upstream(UpstreamError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let err = convert_response(
            &stops(),
            response(r#"{"code": "Ok", "distances": [[0.0, 1.0]]}"#),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            PlannerError::Upstream(UpstreamError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: OsrmConfig = serde_json::from_str(r#"{"base_url": "http://osrm:5000"}"#).unwrap();
        assert_eq!(config.base_url, "http://osrm:5000");
        assert_eq!(config.profile, "driving");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}
