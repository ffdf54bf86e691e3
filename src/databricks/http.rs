//! Reqwest-based client for the Databricks Jobs and DBFS REST APIs (2.0).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use super::types::{FileInfo, LifeCycleState, NotebookOutput, RunExport, RunMetadata, RunOutput};
use super::{ConnectionSettings, JobsService, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{ServiceError, ServiceResult};

const API_PREFIX: &str = "api/2.0";

/// Authenticated connection to one workspace.
#[derive(Clone)]
pub struct Connection {
    http: Client,
    base_url: String,
    token: String,
    cluster_id: Option<String>,
    poll_interval: Duration,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.base_url)
            .field("cluster_id", &self.cluster_id)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn connect(settings: &ConnectionSettings) -> ServiceResult<Self> {
        Self::with_timeout(settings, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(settings: &ConnectionSettings, timeout: Duration) -> ServiceResult<Self> {
        let url = settings.url.as_deref().ok_or_else(|| ServiceError::missing("databricks-url"))?;
        let token = settings
            .token
            .clone()
            .ok_or_else(|| ServiceError::missing("databricks-token"))?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        let mut base_url = url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            base_url = format!("https://{}", base_url);
        }

        Ok(Self {
            http,
            base_url,
            token,
            cluster_id: settings.cluster_id.clone(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, API_PREFIX, endpoint);
        debug!(method = %method, url = %url, "databricks request");
        self.http.request(method, url).bearer_auth(&self.token)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> ServiceResult<T> {
        let resp = req.send().await.map_err(|e| ServiceError::Network {
            message: e.to_string(),
        })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| ServiceError::Network {
            message: format!("failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(text);
            return Err(ServiceError::Api { status: status.as_u16(), message });
        }

        serde_json::from_str(&text).map_err(|e| ServiceError::InvalidResponse {
            message: format!("{}: {}", e, text),
        })
    }

    async fn run_state(&self, run_id: i64) -> ServiceResult<LifeCycleState> {
        let run: RunGetResponse = self
            .send(self.request(Method::GET, "jobs/runs/get").query(&[("run_id", run_id)]))
            .await?;
        Ok(run.state.life_cycle_state)
    }
}

#[async_trait]
impl JobsService for Connection {
    async fn submit_notebook(&self, path: &str, run_name: &str) -> ServiceResult<i64> {
        let cluster_id = self
            .cluster_id
            .as_deref()
            .ok_or_else(|| ServiceError::missing("databricks-cluster-id"))?;

        let body = serde_json::json!({
            "run_name": run_name,
            "existing_cluster_id": cluster_id,
            "notebook_task": { "notebook_path": path },
        });
        let resp: SubmitResponse = self
            .send(self.request(Method::POST, "jobs/runs/submit").json(&body))
            .await?;
        Ok(resp.run_id)
    }

    async fn wait(&self, run_id: i64) -> ServiceResult<()> {
        loop {
            let state = self.run_state(run_id).await?;
            debug!(run_id, state = ?state, "polled run state");
            if state.is_terminal() {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn get_output(&self, run_id: i64) -> ServiceResult<RunOutput> {
        let resp: GetOutputResponse = self
            .send(self.request(Method::GET, "jobs/runs/get-output").query(&[("run_id", run_id)]))
            .await?;
        let meta = resp.metadata;
        let notebook_path = meta
            .task
            .and_then(|t| t.notebook_task)
            .map(|n| n.notebook_path)
            .unwrap_or_default();
        Ok(RunOutput {
            metadata: RunMetadata::new(
                meta.run_id,
                meta.run_name.unwrap_or_default(),
                meta.run_page_url.unwrap_or_default(),
                notebook_path,
            ),
            notebook_output: resp.notebook_output.unwrap_or_default(),
        })
    }

    async fn export(&self, run_id: i64) -> ServiceResult<RunExport> {
        self.send(
            self.request(Method::GET, "jobs/runs/export")
                .query(&[("run_id", run_id.to_string()), ("views_to_export", "CODE".to_string())]),
        )
        .await
    }

    async fn dbfs_ls(&self, path: &str) -> ServiceResult<Vec<FileInfo>> {
        let resp: DbfsListResponse = self
            .send(self.request(Method::GET, "dbfs/list").query(&[("path", path)]))
            .await?;
        Ok(resp.files)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    run_id: i64,
}

#[derive(Debug, Deserialize)]
struct RunGetResponse {
    state: RunState,
}

#[derive(Debug, Deserialize)]
struct RunState {
    life_cycle_state: LifeCycleState,
}

#[derive(Debug, Deserialize)]
struct GetOutputResponse {
    metadata: RawMetadata,
    notebook_output: Option<NotebookOutput>,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    run_id: i64,
    run_name: Option<String>,
    run_page_url: Option<String>,
    task: Option<RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    notebook_task: Option<RawNotebookTask>,
}

#[derive(Debug, Deserialize)]
struct RawNotebookTask {
    notebook_path: String,
}

#[derive(Debug, Deserialize)]
struct DbfsListResponse {
    #[serde(default)]
    files: Vec<FileInfo>,
}
