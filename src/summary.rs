//! Test summary payload exchanged between the notebook and the local client.
//!
//! The notebook side builds it with [`crate::formatter::run_unittest_suite`] and
//! exits with its JSON form; the local side decodes it again in
//! [`crate::result::ExecutionResult::from_run_output`].

use serde::{Deserialize, Serialize};

/// Normalized outcome of one test run.
///
/// Every key is required and unknown keys are rejected when decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSummary {
    pub was_successful: bool,
    pub num_errors: u64,
    pub num_failures: u64,
    pub num_skipped: u64,
    pub num_successes: u64,
    /// ISO-8601, UTC without offset.
    pub start_time: String,
    pub end_time: String,
    /// Seconds, always `end_time - start_time`.
    pub execution_time: f64,
    pub run_output: String,
    pub xml_report: String,
}

impl TestSummary {
    pub fn num_tests(&self) -> u64 {
        self.num_errors
            .saturating_add(self.num_failures)
            .saturating_add(self.num_skipped)
            .saturating_add(self.num_successes)
    }
}

/// Serialize a summary as the notebook exit payload.
pub fn exit_payload(summary: &TestSummary) -> serde_json::Result<String> {
    serde_json::to_string(summary)
}
