//! Error types for the remote service, payload decoding and the test client.

use std::path::PathBuf;

/// Failures talking to the remote job-execution service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A connection parameter was not resolved.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Transport-level failure (connect, timeout, body read).
    #[error("network error: {message}")]
    Network { message: String },

    /// The service answered with a non-success status.
    #[error("databricks API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The service answered with a body we could not understand.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl ServiceError {
    pub(crate) fn missing(setting: &str) -> Self {
        Self::Config {
            message: format!("{} is not set", setting),
        }
    }
}

/// The notebook exit payload could not be turned into a result.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The run finished without calling the notebook exit with a payload.
    #[error("run {run_id} returned no notebook result")]
    MissingResult { run_id: i64 },

    /// Malformed JSON, a missing key or an unexpected key.
    #[error("invalid test result payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Errors surfaced by [`crate::client::TestClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An artifact was requested before any run completed.
    #[error("last_run_result is not set. Nothing to save.")]
    NoRunResult,

    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("export of run {run_id} contains no notebook")]
    EmptyExport { run_id: i64 },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ServiceResult<T> = Result<T, ServiceError>;
pub type ClientResult<T> = Result<T, ClientError>;
