//! Test command outcomes.

use serde::{Deserialize, Serialize};

/// `failures` value for a failed run whose output no parser recognized.
pub const UNPARSED_FAILURES: i64 = -1;

/// Exit code reported when the test command was killed on timeout.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Counts extracted from one framework's summary output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl TestCounts {
    pub fn total(&self) -> u64 {
        self.passed + self.failed + self.skipped
    }
}

/// Outcome of running a task's test command in a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResult {
    /// Derived from the exit code only.
    pub passed: bool,
    pub exit_code: i32,
    pub total: u64,
    /// [`UNPARSED_FAILURES`] when the run failed with unrecognized output.
    pub failures: i64,
    pub skipped: u64,
    pub timed_out: bool,
    pub raw_output: String,
    pub parsed_framework: Option<String>,
    pub duration_ms: u64,
}

impl TestRunResult {
    /// Build a result from a finished (or killed) process and the parser
    /// chain's verdict.
    pub fn from_run(
        exit_code: Option<i32>,
        timed_out: bool,
        raw_output: String,
        parsed: Option<(&str, TestCounts)>,
        duration_ms: u64,
    ) -> Self {
        let exit_code = match (timed_out, exit_code) {
            (true, _) | (false, None) => TIMEOUT_EXIT_CODE,
            (false, Some(code)) => code,
        };
        let passed = !timed_out && exit_code == 0;

        let (total, failures, skipped, parsed_framework) = match parsed {
            Some((framework, counts)) => (
                counts.total(),
                counts.failed as i64,
                counts.skipped,
                Some(framework.to_string()),
            ),
            None if passed => (0, 0, 0, None),
            None => (0, UNPARSED_FAILURES, 0, None),
        };

        Self {
            passed,
            exit_code,
            total,
            failures,
            skipped,
            timed_out,
            raw_output,
            parsed_framework,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unparsed_success_is_not_an_error() {
        let r = TestRunResult::from_run(Some(0), false, "all good".into(), None, 5);
        assert!(r.passed);
        assert_eq!(r.total, 0);
        assert_eq!(r.failures, 0);
        assert!(r.parsed_framework.is_none());
    }

    #[test]
    fn test_unparsed_failure_uses_sentinel() {
        let r = TestRunResult::from_run(Some(1), false, "boom".into(), None, 5);
        assert!(!r.passed);
        assert_eq!(r.failures, UNPARSED_FAILURES);
    }

    #[test]
    fn test_timeout_forces_exit_code() {
        let r = TestRunResult::from_run(None, true, "partial".into(), None, 1000);
        assert!(!r.passed);
        assert!(r.timed_out);
        assert_eq!(r.exit_code, TIMEOUT_EXIT_CODE);
        assert_eq!(r.raw_output, "partial");
    }

    #[test]
    fn test_parsed_counts_do_not_override_exit_code() {
        let counts = TestCounts {
            passed: 3,
            failed: 0,
            skipped: 1,
        };
        let r = TestRunResult::from_run(Some(2), false, String::new(), Some(("pytest", counts)), 1);
        assert!(!r.passed);
        assert_eq!(r.total, 4);
        assert_eq!(r.failures, 0);
        assert_eq!(r.skipped, 1);
        assert_eq!(r.parsed_framework.as_deref(), Some("pytest"));
    }
}
