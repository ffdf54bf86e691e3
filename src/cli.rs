use std::path::PathBuf;

use clap::Parser;

use crate::client::ClientSettings;
use crate::config::{FlagProvider, Setting};

#[derive(Parser, Debug, Clone)]
#[command(name = "dbtest", about = "Run Databricks test notebooks and collect their reports", version)]
pub struct Cli {
    /// Workspace paths of the test notebooks to run.
    #[arg(value_name = "NOTEBOOK", required_unless_present = "dbfs_ls")]
    pub notebooks: Vec<String>,

    /// Databricks bearer token.
    #[arg(long = "databricks-token")]
    pub databricks_token: Option<String>,

    /// Databricks URL.
    #[arg(long = "databricks-url")]
    pub databricks_url: Option<String>,

    /// Databricks cluster id.
    #[arg(long = "databricks-cluster-id")]
    pub databricks_cluster_id: Option<String>,

    /// Environment variable with the Databricks bearer token.
    #[arg(long = "env-databricks-token", value_name = "VAR")]
    pub env_databricks_token: Option<String>,

    /// Environment variable with the Databricks URL.
    #[arg(long = "env-databricks-url", value_name = "VAR")]
    pub env_databricks_url: Option<String>,

    /// Environment variable with the Databricks cluster id.
    #[arg(long = "env-databricks-cluster-id", value_name = "VAR")]
    pub env_databricks_cluster_id: Option<String>,

    /// Config file to read instead of the default .dbtestrc.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run name prefix (default: TEST-<notebook>-).
    #[arg(long = "run-name-prefix")]
    pub run_name_prefix: Option<String>,

    /// Save the JUnit XML report of each run.
    #[arg(long = "save-xml-report")]
    pub save_xml_report: bool,

    /// Save the text output of each run.
    #[arg(long = "save-run-output")]
    pub save_run_output: bool,

    /// Export and save the rendered notebook of each run.
    #[arg(long = "save-notebook-output")]
    pub save_notebook_output: bool,

    /// Save the full result of each run as JSON.
    #[arg(long = "save-exit-result")]
    pub save_exit_result: bool,

    /// Save every artifact kind.
    #[arg(long = "save-all")]
    pub save_all: bool,

    /// Directory for every artifact kind not given its own directory.
    #[arg(long = "dir-auto-save", value_name = "DIR")]
    pub dir_auto_save: Option<PathBuf>,

    #[arg(long = "dir-xml-reports", value_name = "DIR")]
    pub dir_xml_reports: Option<PathBuf>,

    #[arg(long = "dir-run-outputs", value_name = "DIR")]
    pub dir_run_outputs: Option<PathBuf>,

    #[arg(long = "dir-notebook-outputs", value_name = "DIR")]
    pub dir_notebook_outputs: Option<PathBuf>,

    #[arg(long = "dir-exit-results", value_name = "DIR")]
    pub dir_exit_results: Option<PathBuf>,

    /// Seconds between run state polls.
    #[arg(long = "poll-interval", value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// List a DBFS directory and exit (connection smoke test).
    #[arg(long = "dbfs-ls", value_name = "PATH")]
    pub dbfs_ls: Option<String>,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Connection flags, keyed like the config file.
    pub fn flag_provider(&self) -> FlagProvider {
        FlagProvider::from_pairs([
            (Setting::Token.key(), self.databricks_token.clone()),
            (Setting::Url.key(), self.databricks_url.clone()),
            (Setting::ClusterId.key(), self.databricks_cluster_id.clone()),
            (Setting::Token.env_key(), self.env_databricks_token.clone()),
            (Setting::Url.env_key(), self.env_databricks_url.clone()),
            (Setting::ClusterId.env_key(), self.env_databricks_cluster_id.clone()),
        ])
    }

    /// Overlay artifact flags on settings loaded from the config file.
    pub fn apply_to(&self, settings: &mut ClientSettings) {
        if self.save_all {
            settings.set_auto_save(true);
        }
        if let Some(dir) = &self.dir_auto_save {
            settings.set_dir_auto_save(dir);
        }
        let per_kind = [
            (&mut settings.xml_report, self.save_xml_report, &self.dir_xml_reports),
            (&mut settings.run_output, self.save_run_output, &self.dir_run_outputs),
            (&mut settings.notebook_output, self.save_notebook_output, &self.dir_notebook_outputs),
            (&mut settings.exit_result, self.save_exit_result, &self.dir_exit_results),
        ];
        for (target, enabled, dir) in per_kind {
            if enabled {
                target.enabled = true;
            }
            if let Some(dir) = dir {
                target.dir = dir.clone();
            }
        }
    }
}
