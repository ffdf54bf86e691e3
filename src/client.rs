//! Runs test notebooks remotely and persists their artifacts.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info};

use crate::config::Config;
use crate::databricks::{types::notebook_basename, JobsService};
use crate::error::{ClientError, ClientResult};
use crate::result::ExecutionResult;

/// Where one kind of artifact goes, and whether it is saved at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactTarget {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for ArtifactTarget {
    fn default() -> Self {
        Self { enabled: false, dir: PathBuf::from(".") }
    }
}

/// Per-client artifact configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSettings {
    pub xml_report: ArtifactTarget,
    pub run_output: ArtifactTarget,
    pub notebook_output: ArtifactTarget,
    pub exit_result: ArtifactTarget,
}

impl ClientSettings {
    /// Turn saving of every artifact kind on or off.
    pub fn set_auto_save(&mut self, enabled: bool) {
        for target in self.targets_mut() {
            target.enabled = enabled;
        }
    }

    /// Save every artifact kind under `dir`.
    pub fn set_dir_auto_save(&mut self, dir: impl AsRef<Path>) {
        for target in self.targets_mut() {
            target.dir = dir.as_ref().to_path_buf();
        }
    }

    /// Combined `auto-save`/`dir-auto-save` keys first, then per-kind keys.
    pub fn from_config(cfg: &Config) -> Self {
        let mut settings = Self::default();
        if let Some(enabled) = cfg.get_bool("auto-save") {
            settings.set_auto_save(enabled);
        }
        if let Some(dir) = cfg.get_path("dir-auto-save") {
            settings.set_dir_auto_save(dir);
        }
        for kind in ArtifactKind::ALL {
            let (enabled_key, dir_key) = kind.config_keys();
            let target = settings.target_mut(kind);
            if let Some(enabled) = cfg.get_bool(enabled_key) {
                target.enabled = enabled;
            }
            if let Some(dir) = cfg.get_path(dir_key) {
                target.dir = dir;
            }
        }
        settings
    }

    pub fn target(&self, kind: ArtifactKind) -> &ArtifactTarget {
        match kind {
            ArtifactKind::XmlReport => &self.xml_report,
            ArtifactKind::RunOutput => &self.run_output,
            ArtifactKind::NotebookOutput => &self.notebook_output,
            ArtifactKind::ExitResult => &self.exit_result,
        }
    }

    pub fn target_mut(&mut self, kind: ArtifactKind) -> &mut ArtifactTarget {
        match kind {
            ArtifactKind::XmlReport => &mut self.xml_report,
            ArtifactKind::RunOutput => &mut self.run_output,
            ArtifactKind::NotebookOutput => &mut self.notebook_output,
            ArtifactKind::ExitResult => &mut self.exit_result,
        }
    }

    fn targets_mut(&mut self) -> [&mut ArtifactTarget; 4] {
        [
            &mut self.xml_report,
            &mut self.run_output,
            &mut self.notebook_output,
            &mut self.exit_result,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    XmlReport,
    RunOutput,
    NotebookOutput,
    ExitResult,
}

impl ArtifactKind {
    /// In the order they are written after a run.
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::XmlReport,
        ArtifactKind::NotebookOutput,
        ArtifactKind::RunOutput,
        ArtifactKind::ExitResult,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::XmlReport => ".xml",
            ArtifactKind::RunOutput => ".txt",
            ArtifactKind::NotebookOutput => ".html",
            ArtifactKind::ExitResult => ".json",
        }
    }

    fn config_keys(self) -> (&'static str, &'static str) {
        match self {
            ArtifactKind::XmlReport => ("auto-save-xml-report", "dir-xml-reports"),
            ArtifactKind::RunOutput => ("auto-save-run-output", "dir-run-outputs"),
            ArtifactKind::NotebookOutput => ("auto-save-notebook-output", "dir-notebook-outputs"),
            ArtifactKind::ExitResult => ("auto-save-exit-result", "dir-exit-results"),
        }
    }
}

/// Progress of a single `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Submitted,
    Waiting,
    Fetching,
    Completed,
    Failed,
}

/// Submits test notebooks and keeps the result of the latest run.
///
/// The last result is a single slot: concurrent `execute` calls on one
/// client are not supported.
pub struct TestClient {
    service: Arc<dyn JobsService>,
    pub settings: ClientSettings,
    last_run_result: Option<ExecutionResult>,
}

impl TestClient {
    pub fn new(service: Arc<dyn JobsService>) -> Self {
        Self { service, settings: ClientSettings::default(), last_run_result: None }
    }

    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn service(&self) -> &dyn JobsService {
        self.service.as_ref()
    }

    pub fn last_run_result(&self) -> Option<&ExecutionResult> {
        self.last_run_result.as_ref()
    }

    /// Run the notebook at `path`, wait for it and collect its result.
    ///
    /// Remote and decoding errors are returned unchanged; nothing is retried.
    pub async fn execute(
        &mut self,
        path: &str,
        run_name_prefix: Option<&str>,
    ) -> ClientResult<ExecutionResult> {
        let run_name = make_run_name(path, run_name_prefix, Utc::now());
        let result = match self.run(path, &run_name).await {
            Ok(result) => result,
            Err(e) => {
                debug!(phase = ?RunPhase::Failed, run_name = %run_name, error = %e, "run failed");
                return Err(e);
            }
        };

        info!(
            run_name = %run_name,
            run_id = result.run_id,
            run_page_url = %result.run_page_url,
            "Finished {}({}). Run page url: {}",
            run_name,
            result.run_id,
            result.run_page_url
        );
        info!("{}", result.run_output);

        self.last_run_result = Some(result.clone());
        self.write_report().await?;
        Ok(result)
    }

    async fn run(&self, path: &str, run_name: &str) -> ClientResult<ExecutionResult> {
        debug!(phase = ?RunPhase::Idle, path, "submitting run");
        let run_id = self.service.submit_notebook(path, run_name).await?;
        debug!(phase = ?RunPhase::Submitted, run_id);
        info!(path, run_name, run_id, "Submitted {}: {}({})", path, run_name, run_id);

        debug!(phase = ?RunPhase::Waiting, run_id);
        self.service.wait(run_id).await?;

        debug!(phase = ?RunPhase::Fetching, run_id);
        let output = self.service.get_output(run_id).await?;
        let result = ExecutionResult::from_run_output(output)?;
        debug!(phase = ?RunPhase::Completed, run_id);
        Ok(result)
    }

    /// Write every artifact kind that is enabled, returning the written files.
    pub async fn write_report(&self) -> ClientResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        for kind in ArtifactKind::ALL {
            if self.settings.target(kind).enabled {
                written.push(self.write_artifact(kind).await?);
            }
        }
        Ok(written)
    }

    pub async fn write_artifact(&self, kind: ArtifactKind) -> ClientResult<PathBuf> {
        match kind {
            ArtifactKind::XmlReport => self.write_xml_report(),
            ArtifactKind::RunOutput => self.write_run_output(),
            ArtifactKind::NotebookOutput => self.write_notebook_output().await,
            ArtifactKind::ExitResult => self.write_exit_result(),
        }
    }

    pub fn write_xml_report(&self) -> ClientResult<PathBuf> {
        let last = self.last()?;
        self.write_result(&last.xml_report, &self.settings.xml_report.dir, ArtifactKind::XmlReport.extension())
    }

    pub fn write_run_output(&self) -> ClientResult<PathBuf> {
        let last = self.last()?;
        self.write_result(&last.run_output, &self.settings.run_output.dir, ArtifactKind::RunOutput.extension())
    }

    /// Export the rendered notebook of the last run and save it as HTML.
    pub async fn write_notebook_output(&self) -> ClientResult<PathBuf> {
        let last = self.last()?;
        let export = self.service.export(last.run_id).await?;
        let notebook = export
            .notebooks
            .into_iter()
            .next()
            .ok_or(ClientError::EmptyExport { run_id: last.run_id })?;
        self.write_result(
            &notebook.content,
            &self.settings.notebook_output.dir,
            ArtifactKind::NotebookOutput.extension(),
        )
    }

    /// Save the full decoded result, including the raw exit payload, as JSON.
    pub fn write_exit_result(&self) -> ClientResult<PathBuf> {
        let last = self.last()?;
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"   "));
        last.serialize(&mut ser)?;
        let content = String::from_utf8_lossy(&buf);
        self.write_result(&content, &self.settings.exit_result.dir, ArtifactKind::ExitResult.extension())
    }

    /// Write `content` to `{run_name}({run_id}){ext}` under `dir`, creating
    /// `dir` if needed and replacing any existing file.
    pub fn write_result(&self, content: &str, dir: &Path, ext: &str) -> ClientResult<PathBuf> {
        let last = self.last()?;
        let path = dir.join(format!("{}{}", report_filename(last), ext));
        fs::create_dir_all(dir).map_err(|source| ClientError::Io { path: dir.to_path_buf(), source })?;
        fs::write(&path, content).map_err(|source| ClientError::Io { path: path.clone(), source })?;
        debug!(path = %path.display(), "wrote artifact");
        Ok(path)
    }

    fn last(&self) -> ClientResult<&ExecutionResult> {
        self.last_run_result.as_ref().ok_or(ClientError::NoRunResult)
    }
}

/// `{prefix}{YYYYMMDDHHMMSSffffff}`, the prefix defaulting to `TEST-{notebook}-`.
pub fn make_run_name(path: &str, prefix: Option<&str>, now: DateTime<Utc>) -> String {
    let ts = now.format("%Y%m%d%H%M%S%6f");
    match prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}{}", prefix, ts),
        None => format!("TEST-{}-{}", notebook_basename(path), ts),
    }
}

/// `{run_name}({run_id})`, without extension.
pub fn report_filename(result: &ExecutionResult) -> String {
    format!("{}({})", result.run_name(), result.run_id)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::databricks::{ExportedNotebook, FileInfo, NotebookOutput, RunExport, RunMetadata, RunOutput};
    use crate::error::{ServiceError, ServiceResult};

    const PAYLOAD: &str = r#"{"was_successful": false, "num_errors": 0, "num_failures": 1, "num_skipped": 0, "num_successes": 2, "start_time": "2024-01-01T00:00:00", "end_time": "2024-01-01T00:00:01.5", "execution_time": 1.5, "run_output": "FAILED (failures=1)", "xml_report": "<testsuites/>"}"#;

    #[derive(Default)]
    struct FakeService {
        submitted: Mutex<Vec<(String, String)>>,
        fail_wait: bool,
        export: Vec<&'static str>,
    }

    #[async_trait]
    impl JobsService for FakeService {
        async fn submit_notebook(&self, path: &str, run_name: &str) -> ServiceResult<i64> {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push((path.to_string(), run_name.to_string()));
            Ok(100 + submitted.len() as i64)
        }

        async fn wait(&self, _run_id: i64) -> ServiceResult<()> {
            if self.fail_wait {
                return Err(ServiceError::Api { status: 500, message: "cluster gone".into() });
            }
            Ok(())
        }

        async fn get_output(&self, run_id: i64) -> ServiceResult<RunOutput> {
            let (path, run_name) = self.submitted.lock().unwrap().last().cloned().unwrap();
            Ok(RunOutput {
                metadata: RunMetadata::new(run_id, run_name, format!("https://host/#run/{}", run_id), path),
                notebook_output: NotebookOutput { result: Some(PAYLOAD.to_string()), truncated: false },
            })
        }

        async fn export(&self, _run_id: i64) -> ServiceResult<RunExport> {
            Ok(RunExport {
                notebooks: self
                    .export
                    .iter()
                    .map(|c| ExportedNotebook { name: "nb".into(), content: c.to_string() })
                    .collect(),
            })
        }

        async fn dbfs_ls(&self, _path: &str) -> ServiceResult<Vec<FileInfo>> {
            Ok(Vec::new())
        }
    }

    fn client(service: FakeService) -> TestClient {
        TestClient::new(Arc::new(service))
    }

    #[test]
    fn run_name_defaults_to_notebook_prefix() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::microseconds(1);
        assert_eq!(make_run_name("/a/b/Test_Foo", None, now), "TEST-Test_Foo-20240101000000000001");
        assert_eq!(make_run_name("/a/b/Test_Foo", Some("nightly-"), now), "nightly-20240101000000000001");
    }

    #[test]
    fn empty_prefix_uses_notebook_prefix() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(make_run_name("/a/b/Test_Foo", Some(""), now), "TEST-Test_Foo-20240101000000000000");
    }

    #[test]
    fn run_names_differ_by_microsecond() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a = make_run_name("foo", None, base + chrono::Duration::microseconds(1));
        let b = make_run_name("foo", None, base + chrono::Duration::microseconds(2));
        assert_eq!(a, "TEST-foo-20240101000000000001");
        assert_eq!(b, "TEST-foo-20240101000000000002");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn execute_collects_result() {
        let mut client = client(FakeService::default());
        let result = client.execute("/a/b/Test_Foo", None).await.unwrap();

        assert_eq!(result.run_id, 101);
        assert!(!result.was_successful);
        assert_eq!(result.num_failures, 1);
        assert_eq!(result.notebook_name(), "Test_Foo");
        assert!(result.run_name().starts_with("TEST-Test_Foo-"));
        let ts = &result.run_name()["TEST-Test_Foo-".len()..];
        assert_eq!(ts.len(), 20);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(client.last_run_result(), Some(&result));
    }

    #[tokio::test]
    async fn execute_overwrites_last_result() {
        let mut client = client(FakeService::default());
        client.execute("/nb/One", None).await.unwrap();
        let second = client.execute("/nb/Two", Some("again-")).await.unwrap();
        assert_eq!(client.last_run_result().unwrap().run_id, second.run_id);
        assert_eq!(client.last_run_result().unwrap().notebook_name(), "Two");
    }

    #[tokio::test]
    async fn remote_failure_propagates_and_keeps_previous_result() {
        let mut client = client(FakeService { fail_wait: true, ..Default::default() });
        let err = client.execute("/nb/One", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Service(ServiceError::Api { status: 500, .. })));
        assert!(client.last_run_result().is_none());
    }

    #[tokio::test]
    async fn writers_require_a_run() {
        let client = client(FakeService::default());
        for kind in ArtifactKind::ALL {
            let err = client.write_artifact(kind).await.unwrap_err();
            assert!(matches!(err, ClientError::NoRunResult), "{:?}", kind);
        }
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(client.write_result("x", dir.path(), ".txt"), Err(ClientError::NoRunResult)));
    }

    #[tokio::test]
    async fn write_result_creates_nested_dirs() {
        let mut client = client(FakeService::default());
        let result = client.execute("/nb/Test_Foo", None).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("c");

        let path = client.write_result(&result.run_output, &nested, ".txt").unwrap();

        assert_eq!(path, nested.join(format!("{}({}).txt", result.run_name(), result.run_id)));
        assert_eq!(fs::read_to_string(&path).unwrap(), result.run_output);
    }

    #[tokio::test]
    async fn auto_save_writes_enabled_kinds_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = client(FakeService { export: vec!["<html>nb</html>"], ..Default::default() });
        client.settings.set_dir_auto_save(dir.path());
        client.settings.xml_report.enabled = true;
        client.settings.notebook_output.enabled = true;

        let result = client.execute("/nb/Test_Foo", None).await.unwrap();
        let stem = report_filename(&result);

        assert_eq!(fs::read_to_string(dir.path().join(format!("{}.xml", stem))).unwrap(), "<testsuites/>");
        assert_eq!(fs::read_to_string(dir.path().join(format!("{}.html", stem))).unwrap(), "<html>nb</html>");
        assert!(!dir.path().join(format!("{}.txt", stem)).exists());
        assert!(!dir.path().join(format!("{}.json", stem)).exists());
    }

    #[tokio::test]
    async fn exit_result_holds_full_result() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = client(FakeService::default());
        client.settings.exit_result = ArtifactTarget { enabled: true, dir: dir.path().to_path_buf() };

        let result = client.execute("/nb/Test_Foo", None).await.unwrap();
        let path = dir.path().join(format!("{}.json", report_filename(&result)));
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("\n   \"run_id\": "));

        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["exit_result"], PAYLOAD);
        assert_eq!(json["num_failures"], 1);
        assert_eq!(json["output"]["metadata"]["notebook_name"], "Test_Foo");
    }

    #[tokio::test]
    async fn empty_export_is_an_error() {
        let mut client = client(FakeService::default());
        client.execute("/nb/Test_Foo", None).await.unwrap();
        let err = client.write_notebook_output().await.unwrap_err();
        assert!(matches!(err, ClientError::EmptyExport { run_id: 101 }));
    }

    #[test]
    fn settings_from_config() {
        let cfg = Config::parse(
            "auto-save = true\ndir-auto-save = results\nauto-save-notebook-output = false\ndir-xml-reports = results/xml\n",
        );
        let settings = ClientSettings::from_config(&cfg);
        assert!(settings.xml_report.enabled);
        assert!(settings.run_output.enabled);
        assert!(!settings.notebook_output.enabled);
        assert_eq!(settings.xml_report.dir, PathBuf::from("results/xml"));
        assert_eq!(settings.exit_result.dir, PathBuf::from("results"));
    }

    #[test]
    fn defaults_are_off_and_current_dir() {
        let settings = ClientSettings::default();
        for kind in ArtifactKind::ALL {
            assert_eq!(settings.target(kind), &ArtifactTarget { enabled: false, dir: PathBuf::from(".") });
        }
    }
}
