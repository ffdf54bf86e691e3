//! Data returned by the job-execution service.

use serde::{Deserialize, Serialize};

/// Identifying metadata of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: i64,
    pub run_name: String,
    pub run_page_url: String,
    pub notebook_path: String,
    pub notebook_name: String,
}

impl RunMetadata {
    pub fn new(
        run_id: i64,
        run_name: impl Into<String>,
        run_page_url: impl Into<String>,
        notebook_path: impl Into<String>,
    ) -> Self {
        let notebook_path = notebook_path.into();
        Self {
            run_id,
            run_name: run_name.into(),
            run_page_url: run_page_url.into(),
            notebook_name: notebook_basename(&notebook_path).to_string(),
            notebook_path,
        }
    }
}

/// Value the notebook passed to its exit call, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotebookOutput {
    pub result: Option<String>,
    #[serde(default)]
    pub truncated: bool,
}

/// Output of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub metadata: RunMetadata,
    pub notebook_output: NotebookOutput,
}

/// One exported rendering of a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportedNotebook {
    #[serde(default)]
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunExport {
    #[serde(default, alias = "views")]
    pub notebooks: Vec<ExportedNotebook>,
}

/// Entry of a DBFS directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub file_size: u64,
}

/// Run life-cycle states reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifeCycleState {
    Pending,
    Running,
    Terminating,
    Terminated,
    Skipped,
    InternalError,
    Blocked,
    WaitingForRetry,
    #[serde(other)]
    Unknown,
}

impl LifeCycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Skipped | Self::InternalError)
    }
}

/// Last path segment of a workspace path.
pub fn notebook_basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
