//! In-process test runner used on the notebook side.
//!
//! Runs a [`TestSuite`], captures a human-readable narrative and a
//! machine-readable report into memory, and condenses both into a
//! [`TestSummary`] whose JSON form is the notebook exit payload.

use std::{
    io,
    panic::{self, AssertUnwindSafe},
    time::Instant,
};

use chrono::{DateTime, SubsecRound, Utc};

use crate::summary::TestSummary;

pub mod junit;
mod narrative;

pub use junit::{JunitReport, ReportWriter, SuiteReport};
use narrative::Narrative;

/// Why a single test did not pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestFailure {
    /// An assertion did not hold.
    Failure(String),
    /// The test decided not to run.
    Skipped(String),
    /// The test could not complete.
    Error(String),
}

pub type TestFn = Box<dyn Fn() -> Result<(), TestFailure>>;

/// A single runnable test method.
pub struct TestCase {
    group: String,
    name: String,
    func: TestFn,
}

impl TestCase {
    pub fn new<F>(group: impl Into<String>, name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> Result<(), TestFailure> + 'static,
    {
        Self { group: group.into(), name: name.into(), func: Box::new(func) }
    }

    pub fn id(&self) -> String {
        format!("{}.{}", self.group, self.name)
    }
}

/// Named grouping of test methods, resolved into a suite of all its methods.
pub struct TestGroup {
    name: String,
    cases: Vec<TestCase>,
}

impl TestGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), cases: Vec::new() }
    }

    pub fn test<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> Result<(), TestFailure> + 'static,
    {
        self.cases.push(TestCase::new(self.name.clone(), name, func));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered collection of test cases.
#[derive(Default)]
pub struct TestSuite {
    cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, case: TestCase) {
        self.cases.push(case);
    }

    pub fn add_group(&mut self, group: TestGroup) {
        self.cases.extend(group.cases);
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl From<TestGroup> for TestSuite {
    fn from(group: TestGroup) -> Self {
        Self { cases: group.cases }
    }
}

impl FromIterator<TestGroup> for TestSuite {
    fn from_iter<I: IntoIterator<Item = TestGroup>>(iter: I) -> Self {
        let mut suite = Self::new();
        for group in iter {
            suite.add_group(group);
        }
        suite
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
    Error(String),
    Skipped(String),
}

/// What happened to one test case.
#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub group: String,
    pub name: String,
    pub outcome: Outcome,
    /// Seconds.
    pub duration: f64,
}

/// Run `suite` with the default JUnit reporter.
pub fn run_unittest_suite(suite: impl Into<TestSuite>) -> io::Result<TestSummary> {
    run_with_reporter(suite, &JunitReport)
}

/// Run `suite`, writing the structured report with `reporter`.
pub fn run_with_reporter(
    suite: impl Into<TestSuite>,
    reporter: &dyn ReportWriter,
) -> io::Result<TestSummary> {
    let suite = suite.into();
    let mut narrative = Narrative::default();

    let start = now();
    let records: Vec<CaseRecord> = suite
        .cases
        .iter()
        .map(|case| {
            let record = run_case(case);
            narrative.case_line(&record);
            record
        })
        .collect();
    let end = now();
    let execution_time = epoch_seconds(end) - epoch_seconds(start);

    let start_time = iso_timestamp(start);
    let mut report = Vec::new();
    reporter.write_report(
        &SuiteReport { records: &records, timestamp: &start_time, execution_time },
        &mut report,
    )?;
    let xml_report =
        String::from_utf8(report).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let (mut num_errors, mut num_failures, mut num_skipped, mut num_successes) = (0, 0, 0, 0);
    for record in &records {
        match record.outcome {
            Outcome::Success => num_successes += 1,
            Outcome::Failure(_) => num_failures += 1,
            Outcome::Error(_) => num_errors += 1,
            Outcome::Skipped(_) => num_skipped += 1,
        }
    }

    Ok(TestSummary {
        was_successful: num_errors == 0 && num_failures == 0,
        num_errors,
        num_failures,
        num_skipped,
        num_successes,
        start_time,
        end_time: iso_timestamp(end),
        execution_time,
        run_output: narrative.finish(&records, execution_time),
        xml_report,
    })
}

fn run_case(case: &TestCase) -> CaseRecord {
    let started = Instant::now();
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| (case.func)())) {
        Ok(Ok(())) => Outcome::Success,
        Ok(Err(TestFailure::Failure(msg))) => Outcome::Failure(msg),
        Ok(Err(TestFailure::Skipped(reason))) => Outcome::Skipped(reason),
        Ok(Err(TestFailure::Error(msg))) => Outcome::Error(msg),
        Err(payload) => Outcome::Error(panic_message(payload.as_ref())),
    };
    CaseRecord {
        group: case.group.clone(),
        name: case.name.clone(),
        outcome,
        duration: started.elapsed().as_secs_f64(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

// Microsecond precision so the ISO strings carry exactly the instants used
// for `execution_time`.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn epoch_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_micros()) / 1_000_000.0
}

pub(crate) fn iso_timestamp(t: DateTime<Utc>) -> String {
    t.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
