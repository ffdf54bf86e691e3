//! Structured report writers.

use std::io::{self, Write};

use super::{CaseRecord, Outcome};

/// Everything a report writer gets to see about a finished run.
pub struct SuiteReport<'a> {
    pub records: &'a [CaseRecord],
    /// ISO-8601 start of the run.
    pub timestamp: &'a str,
    pub execution_time: f64,
}

/// Renders a finished run into a machine-readable report.
pub trait ReportWriter {
    fn write_report(&self, report: &SuiteReport<'_>, out: &mut dyn Write) -> io::Result<()>;
}

/// JUnit XML, one `<testsuite>` per test group.
#[derive(Debug, Default, Clone, Copy)]
pub struct JunitReport;

impl ReportWriter for JunitReport {
    fn write_report(&self, report: &SuiteReport<'_>, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(out, r#"<testsuites time="{:.3}">"#, report.execution_time)?;

        for (group, cases) in group_in_order(report.records) {
            let count = |f: &dyn Fn(&Outcome) -> bool| cases.iter().filter(|c| f(&c.outcome)).count();
            let time: f64 = cases.iter().map(|c| c.duration).sum();
            writeln!(
                out,
                r#"  <testsuite name="{}" tests="{}" failures="{}" errors="{}" skipped="{}" time="{:.3}" timestamp="{}">"#,
                escape(group),
                cases.len(),
                count(&|o| matches!(o, Outcome::Failure(_))),
                count(&|o| matches!(o, Outcome::Error(_))),
                count(&|o| matches!(o, Outcome::Skipped(_))),
                time,
                escape(report.timestamp),
            )?;
            for case in cases {
                write!(
                    out,
                    r#"    <testcase classname="{}" name="{}" time="{:.3}""#,
                    escape(&case.group),
                    escape(&case.name),
                    case.duration
                )?;
                match &case.outcome {
                    Outcome::Success => writeln!(out, "/>")?,
                    Outcome::Failure(msg) => {
                        writeln!(out, ">")?;
                        writeln!(
                            out,
                            r#"      <failure type="AssertionError" message="{}">{}</failure>"#,
                            escape(first_line(msg)),
                            escape(msg)
                        )?;
                        writeln!(out, "    </testcase>")?;
                    }
                    Outcome::Error(msg) => {
                        writeln!(out, ">")?;
                        writeln!(
                            out,
                            r#"      <error type="Error" message="{}">{}</error>"#,
                            escape(first_line(msg)),
                            escape(msg)
                        )?;
                        writeln!(out, "    </testcase>")?;
                    }
                    Outcome::Skipped(reason) => {
                        writeln!(out, ">")?;
                        writeln!(out, r#"      <skipped message="{}"/>"#, escape(reason))?;
                        writeln!(out, "    </testcase>")?;
                    }
                }
            }
            writeln!(out, "  </testsuite>")?;
        }

        writeln!(out, "</testsuites>")
    }
}

fn group_in_order(records: &[CaseRecord]) -> Vec<(&str, Vec<&CaseRecord>)> {
    let mut groups: Vec<(&str, Vec<&CaseRecord>)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(name, _)| *name == record.group) {
            Some((_, cases)) => cases.push(record),
            None => groups.push((record.group.as_str(), vec![record])),
        }
    }
    groups
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' | '\n' | '\r' => out.push(c),
            // not allowed in XML 1.0
            c if c < '\u{20}' || c == '\u{fffe}' || c == '\u{ffff}' => {}
            c => out.push(c),
        }
    }
    out
}
