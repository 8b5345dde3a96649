//! Error taxonomy shared by every stage of a route pipeline.
//!
//! Errors are cheap to clone so a failure loading one shared matrix file can
//! be recorded against every route that references it.

use thiserror::Error;

use crate::stop::StopId;

/// Failure of the live distance service.
///
/// The variants are kept apart because each needs a different fix: a dead
/// service, a slow one, and one returning bad data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The service could not be reached at all.
    #[error("distance service unreachable at {url}: {message}")]
    Unreachable { url: String, message: String },

    /// The request did not complete within the configured timeout.
    #[error("distance service at {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The service answered with a non-success HTTP status.
    #[error("distance service at {url} returned HTTP {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// The service answered, but with a non-"Ok" status code in the body.
    #[error("distance service error {code}: {message}")]
    Service { code: String, message: String },

    /// The body could not be decoded or did not carry a usable matrix.
    #[error("malformed distance service response: {message}")]
    MalformedResponse { message: String },
}

/// Errors raised while planning a single route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// Empty or otherwise unusable input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The depot id is not among the registered stops.
    #[error("depot {0} is not among the registered stops")]
    DepotNotFound(StopId),

    /// Requested ids that the matrix (or stop set) does not know about.
    ///
    /// Every offending id is listed, in request order.
    #[error("unknown stop ids: {ids:?}")]
    UnknownIds { ids: Vec<StopId> },

    /// The matrix source could not be opened.
    #[error("distance matrix not found at {path}: {message}")]
    MatrixNotFound { path: String, message: String },

    /// The matrix source was readable but violates the table contract.
    #[error("malformed distance matrix {origin}: {message}")]
    MalformedMatrix { origin: String, message: String },

    /// The live distance service failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The batch was cancelled before this route started.
    #[error("route planning cancelled before it started")]
    Cancelled,
}

impl PlannerError {
    pub(crate) fn malformed(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedMatrix {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ids_lists_every_id() {
        let err = PlannerError::UnknownIds { ids: vec![99, 42] };
        assert_eq!(err.to_string(), "unknown stop ids: [99, 42]");
    }

    #[test]
    fn upstream_errors_are_transparent() {
        let err: PlannerError = UpstreamError::Timeout {
            url: "http://osrm/table".to_string(),
            timeout_secs: 30,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "distance service at http://osrm/table timed out after 30s"
        );
    }
}
