//! Verbose text log of a test run.

use std::fmt::Write as _;

use super::{CaseRecord, Outcome};

const DOUBLE_RULE: &str =
    "======================================================================";
const RULE: &str = "----------------------------------------------------------------------";

#[derive(Debug, Default)]
pub(super) struct Narrative {
    buf: String,
}

impl Narrative {
    pub(super) fn case_line(&mut self, record: &CaseRecord) {
        let verdict = match &record.outcome {
            Outcome::Success => "ok".to_string(),
            Outcome::Failure(_) => "FAIL".to_string(),
            Outcome::Error(_) => "ERROR".to_string(),
            Outcome::Skipped(reason) => format!("skipped '{}'", reason),
        };
        let _ = writeln!(self.buf, "{} ({}) ... {}", record.name, record.group, verdict);
    }

    pub(super) fn finish(mut self, records: &[CaseRecord], execution_time: f64) -> String {
        let errors = records.iter().filter_map(|r| match &r.outcome {
            Outcome::Error(msg) => Some(("ERROR", r, msg)),
            _ => None,
        });
        let failures = records.iter().filter_map(|r| match &r.outcome {
            Outcome::Failure(msg) => Some(("FAIL", r, msg)),
            _ => None,
        });

        if !records.is_empty() {
            self.buf.push('\n');
        }
        let (mut num_errors, mut num_failures) = (0, 0);
        for (flavour, record, msg) in errors.chain(failures) {
            if flavour == "ERROR" {
                num_errors += 1;
            } else {
                num_failures += 1;
            }
            let _ = writeln!(self.buf, "{}", DOUBLE_RULE);
            let _ = writeln!(self.buf, "{}: {} ({})", flavour, record.name, record.group);
            let _ = writeln!(self.buf, "{}", RULE);
            let _ = writeln!(self.buf, "{}\n", msg);
        }
        let num_skipped = records
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Skipped(_)))
            .count();

        let _ = writeln!(self.buf, "{}", RULE);
        let _ = writeln!(
            self.buf,
            "Ran {} test{} in {:.3}s\n",
            records.len(),
            if records.len() == 1 { "" } else { "s" },
            execution_time
        );

        let mut details = Vec::new();
        if num_failures > 0 {
            details.push(format!("failures={}", num_failures));
        }
        if num_errors > 0 {
            details.push(format!("errors={}", num_errors));
        }
        if num_skipped > 0 {
            details.push(format!("skipped={}", num_skipped));
        }
        let verdict = if num_errors == 0 && num_failures == 0 { "OK" } else { "FAILED" };
        if details.is_empty() {
            let _ = writeln!(self.buf, "{}", verdict);
        } else {
            let _ = writeln!(self.buf, "{} ({})", verdict, details.join(", "));
        }
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, outcome: Outcome) -> CaseRecord {
        CaseRecord { group: "TestThing".into(), name: name.into(), outcome, duration: 0.0 }
    }

    #[test]
    fn all_passing() {
        let records = vec![record("test_a", Outcome::Success), record("test_b", Outcome::Success)];
        let mut narrative = Narrative::default();
        records.iter().for_each(|r| narrative.case_line(r));
        let text = narrative.finish(&records, 0.25);
        assert!(text.starts_with("test_a (TestThing) ... ok\ntest_b (TestThing) ... ok\n"));
        assert!(text.contains("Ran 2 tests in 0.250s"));
        assert!(text.trim_end().ends_with("OK"));
    }

    #[test]
    fn failures_are_detailed() {
        let records = vec![
            record("test_a", Outcome::Failure("expected 1, got 2".into())),
            record("test_b", Outcome::Error("no such table".into())),
            record("test_c", Outcome::Skipped("slow".into())),
        ];
        let mut narrative = Narrative::default();
        records.iter().for_each(|r| narrative.case_line(r));
        let text = narrative.finish(&records, 1.0);
        assert!(text.contains("test_c (TestThing) ... skipped 'slow'"));
        assert!(text.contains("FAIL: test_a (TestThing)"));
        assert!(text.contains("ERROR: test_b (TestThing)"));
        assert!(text.contains("expected 1, got 2"));
        assert!(text.trim_end().ends_with("FAILED (failures=1, errors=1, skipped=1)"));
    }
}
