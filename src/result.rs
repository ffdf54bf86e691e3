//! Typed result of one remote test run.

use serde::Serialize;

use crate::databricks::RunOutput;
use crate::error::DecodeError;
use crate::summary::TestSummary;

/// Outcome of a notebook run, decoded from its exit payload.
///
/// Built once per [`crate::client::TestClient::execute`] call and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub run_id: i64,
    pub run_page_url: String,
    pub was_successful: bool,
    pub num_errors: u64,
    pub num_failures: u64,
    pub num_skipped: u64,
    pub num_successes: u64,
    pub start_time: String,
    pub end_time: String,
    pub execution_time: f64,
    pub xml_report: String,
    pub run_output: String,
    /// Raw JSON exactly as the notebook exited with it.
    pub exit_result: String,
    /// Service output the result was decoded from.
    pub output: RunOutput,
}

impl ExecutionResult {
    pub fn from_run_output(output: RunOutput) -> Result<Self, DecodeError> {
        let raw = output
            .notebook_output
            .result
            .clone()
            .ok_or(DecodeError::MissingResult { run_id: output.metadata.run_id })?;
        let summary: TestSummary = serde_json::from_str(&raw)?;

        Ok(Self {
            run_id: output.metadata.run_id,
            run_page_url: output.metadata.run_page_url.clone(),
            was_successful: summary.was_successful,
            num_errors: summary.num_errors,
            num_failures: summary.num_failures,
            num_skipped: summary.num_skipped,
            num_successes: summary.num_successes,
            start_time: summary.start_time,
            end_time: summary.end_time,
            execution_time: summary.execution_time,
            xml_report: summary.xml_report,
            run_output: summary.run_output,
            exit_result: raw,
            output,
        })
    }

    pub fn notebook_name(&self) -> &str {
        &self.output.metadata.notebook_name
    }

    pub fn run_name(&self) -> &str {
        &self.output.metadata.run_name
    }

    pub fn num_tests(&self) -> u64 {
        self.num_errors
            .saturating_add(self.num_failures)
            .saturating_add(self.num_skipped)
            .saturating_add(self.num_successes)
    }
}
