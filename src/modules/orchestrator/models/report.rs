//! Aggregate suite report
//!
//! Text rendering for the console, JSON for CI, and an exit code.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::{CaseReport, CaseStatus};
use crate::core::Result;

/// Summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub total_assertions: usize,
    pub passed_assertions: usize,
    pub failed_assertions: usize,
}

impl SuiteSummary {
    pub fn from_cases(cases: &[CaseReport]) -> Self {
        let mut summary = SuiteSummary {
            total: cases.len(),
            ..Default::default()
        };

        for case in cases {
            match case.status {
                CaseStatus::Passed => summary.passed += 1,
                CaseStatus::Failed => summary.failed += 1,
                CaseStatus::Error => summary.errors += 1,
            }
            summary.total_assertions += case.outcomes.len();
            summary.passed_assertions += case.outcomes.iter().filter(|o| o.passed).count();
        }
        summary.failed_assertions = summary.total_assertions - summary.passed_assertions;

        summary
    }
}

/// Complete suite run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub summary: SuiteSummary,
    pub cases: Vec<CaseReport>,
    /// Suite-level teardown failures (shared dependencies)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teardown_errors: Vec<String>,
}

impl SuiteReport {
    pub fn new(
        suite: impl Into<String>,
        run_id: impl Into<String>,
        started_at: DateTime<Utc>,
        cases: Vec<CaseReport>,
        teardown_errors: Vec<String>,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            suite: suite.into(),
            run_id: run_id.into(),
            started_at,
            finished_at,
            duration_ms,
            summary: SuiteSummary::from_cases(&cases),
            cases,
            teardown_errors,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.summary.passed == self.summary.total && self.teardown_errors.is_empty()
    }

    /// 0 if every case passed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Human-readable rendering
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Suite '{}' (run {})", self.suite, self.run_id);

        for case in &self.cases {
            let marker = match case.status {
                CaseStatus::Passed => "PASS",
                CaseStatus::Failed => "FAIL",
                CaseStatus::Error => "ERROR",
            };
            let _ = writeln!(out, "  [{}] {} ({}ms)", marker, case.name, case.duration_ms);

            for outcome in case.failed_outcomes() {
                let _ = writeln!(
                    out,
                    "      {} / {}: {}",
                    outcome.stage, outcome.description, outcome.explanation
                );
            }
            if let Some(failure) = &case.failure {
                let _ = writeln!(
                    out,
                    "      cause at {} ({}): {}",
                    failure.stage, failure.kind, failure.message
                );
            }
            for error in &case.teardown_errors {
                let _ = writeln!(out, "      teardown: {}", error);
            }
        }

        for error in &self.teardown_errors {
            let _ = writeln!(out, "  suite teardown: {}", error);
        }

        let s = &self.summary;
        let _ = writeln!(
            out,
            "{} cases: {} passed, {} failed, {} errors; {}/{} assertions passed ({}ms)",
            s.total,
            s.passed,
            s.failed,
            s.errors,
            s.passed_assertions,
            s.total_assertions,
            self.duration_ms
        );
        out
    }
}
