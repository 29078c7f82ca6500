//! PLATEAU API client error types.

use std::path::PathBuf;
use std::time::Duration;

use plateau_core::{PackStatus, ValidationError};
use serde::Serialize;

/// Errors from PLATEAU API operations.
#[derive(Debug, thiserror::Error)]
pub enum PlateauApiError {
    /// Caller-supplied input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
    /// A pack request was submitted without any URL.
    #[error("pack request must contain at least one URL")]
    EmptyRequest,
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The API returned a non-2xx status.
    #[error("PLATEAU API {endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The response parsed but its content is not something this client understands.
    #[error("unexpected response from {endpoint}: {detail}")]
    UnexpectedResponse { endpoint: String, detail: String },
    /// The service does not know the packaging job.
    #[error("pack job {id} not found")]
    UnknownJob { id: String },
    /// The packaging job did not reach a terminal state before the deadline.
    /// The job itself is unaffected and may be polled again later.
    #[error("pack job {id} still {last_status} after {waited:?}")]
    Timeout {
        id: String,
        last_status: PackStatus,
        waited: Duration,
    },
    /// A download was requested for a job that has not completed.
    #[error("pack job {id} is {status}, not completed")]
    NotReady { id: String, status: PackStatus },
    /// Downloading an archive failed; no partial file was left behind.
    #[error("transfer of {url} failed: {reason}")]
    Transfer { url: String, reason: String },
    /// Expanding a downloaded archive failed.
    #[error("extracting {} failed: {reason}", .path.display())]
    Extraction { path: PathBuf, reason: String },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

/// Stable error vocabulary surfaced to the tool-invocation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidInput,
    EmptyRequest,
    UpstreamError,
    UnknownJob,
    Timeout,
    NotReady,
    TransferError,
    ExtractionError,
    ConfigError,
}

impl PlateauApiError {
    /// The error's kind, for callers deciding whether to retry or reformulate.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::EmptyRequest => ErrorKind::EmptyRequest,
            Self::Http { .. }
            | Self::ApiError { .. }
            | Self::Deserialization { .. }
            | Self::UnexpectedResponse { .. } => ErrorKind::UpstreamError,
            Self::UnknownJob { .. } => ErrorKind::UnknownJob,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NotReady { .. } => ErrorKind::NotReady,
            Self::Transfer { .. } => ErrorKind::TransferError,
            Self::Extraction { .. } => ErrorKind::ExtractionError,
            Self::Config(_) => ErrorKind::ConfigError,
        }
    }

    /// Whether a later identical request could plausibly succeed: transport
    /// failures, 5xx responses and 429 rate limiting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::ApiError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_variants_share_a_kind() {
        let err = PlateauApiError::ApiError {
            endpoint: "POST /citygml/pack".into(),
            status: 400,
            body: "bad urls".into(),
        };
        assert_eq!(err.kind(), ErrorKind::UpstreamError);
        assert!(!err.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        for status in [500, 502, 503, 429] {
            let err = PlateauApiError::ApiError {
                endpoint: "GET /citygml/pack/x/status".into(),
                status,
                body: String::new(),
            };
            assert!(err.is_transient(), "{status}");
        }
    }

    #[test]
    fn timeout_message_names_job_and_state() {
        let err = PlateauApiError::Timeout {
            id: "job-9".into(),
            last_status: PackStatus::Processing,
            waited: Duration::from_secs(5),
        };
        let msg = err.to_string();
        assert!(msg.contains("job-9"));
        assert!(msg.contains("processing"));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(!err.is_transient());
    }

    #[test]
    fn validation_errors_convert() {
        let err: PlateauApiError = ValidationError::InvalidMeshLevel(7).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
