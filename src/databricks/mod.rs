//! Boundary to the remote job-execution service.
//!
//! [`JobsService`] is everything the test client needs from the service;
//! [`Connection`] implements it over the Databricks REST API.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ServiceResult;

mod http;
pub mod types;

pub use http::Connection;
pub use types::{ExportedNotebook, FileInfo, NotebookOutput, RunExport, RunMetadata, RunOutput};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolved connection parameters. Any of them may be absent; the
/// connection rejects what it needs when it needs it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionSettings {
    pub token: Option<String>,
    pub url: Option<String>,
    pub cluster_id: Option<String>,
}

/// Remote primitives used to run a notebook and collect its output.
#[async_trait]
pub trait JobsService: Send + Sync {
    /// Submit a one-off notebook run, returning its run id.
    async fn submit_notebook(&self, path: &str, run_name: &str) -> ServiceResult<i64>;

    /// Block until the run reaches a terminal state.
    async fn wait(&self, run_id: i64) -> ServiceResult<()>;

    async fn get_output(&self, run_id: i64) -> ServiceResult<RunOutput>;

    /// Rendered notebook(s) of a finished run.
    async fn export(&self, run_id: i64) -> ServiceResult<RunExport>;

    async fn dbfs_ls(&self, path: &str) -> ServiceResult<Vec<FileInfo>>;
}
