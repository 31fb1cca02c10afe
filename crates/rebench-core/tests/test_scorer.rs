//! Test command execution and output classification.

use std::time::Duration;

use rebench_core::domain::test_run::UNPARSED_FAILURES;
use rebench_core::exec::Deadline;
use rebench_core::{ParserChain, ScorerError, TestScorer};

const TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::test]
async fn passing_run_with_unknown_output() {
    let dir = tempfile::tempdir().unwrap();
    let result = TestScorer::default()
        .run(dir.path(), "echo all good", TIMEOUT, Deadline::none())
        .await
        .unwrap();
    assert!(result.passed);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.failures, 0);
    assert_eq!(result.total, 0);
    assert!(result.parsed_framework.is_none());
    assert!(result.raw_output.contains("all good"));
}

#[tokio::test]
async fn failing_run_with_unknown_output_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let result = TestScorer::default()
        .run(dir.path(), "echo boom >&2; exit 2", TIMEOUT, Deadline::none())
        .await
        .unwrap();
    assert!(!result.passed);
    assert_eq!(result.exit_code, 2);
    assert_eq!(result.failures, UNPARSED_FAILURES);
    assert!(result.raw_output.contains("boom"));
}

#[tokio::test]
async fn pytest_summary_is_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let script = "echo 'tests/test_api.py ..F.'; \
                  echo '=========== 1 failed, 3 passed, 1 skipped in 0.42s ==========='; \
                  exit 1";
    let result = TestScorer::default()
        .run(dir.path(), script, TIMEOUT, Deadline::none())
        .await
        .unwrap();
    assert!(!result.passed);
    assert_eq!(result.parsed_framework.as_deref(), Some("pytest"));
    assert_eq!(result.total, 5);
    assert_eq!(result.failures, 1);
    assert_eq!(result.skipped, 1);
}

#[tokio::test]
async fn exit_code_decides_pass_even_when_output_disagrees() {
    let dir = tempfile::tempdir().unwrap();
    let script = "echo 'test result: FAILED. 2 passed; 1 failed; 0 ignored; 0 measured; 0 filtered out'";
    let result = TestScorer::default()
        .run(dir.path(), script, TIMEOUT, Deadline::none())
        .await
        .unwrap();
    assert!(result.passed);
    assert_eq!(result.parsed_framework.as_deref(), Some("cargo-test"));
    assert_eq!(result.failures, 1);
}

#[tokio::test]
async fn timeout_keeps_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let result = TestScorer::default()
        .run(
            dir.path(),
            "echo started; sleep 10",
            Duration::from_millis(300),
            Deadline::none(),
        )
        .await
        .unwrap();
    assert!(result.timed_out);
    assert!(!result.passed);
    assert_eq!(result.exit_code, -1);
    assert!(result.raw_output.contains("started"));
}

#[tokio::test]
async fn deadline_shortens_the_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let result = TestScorer::default()
        .run(
            dir.path(),
            "sleep 10",
            TIMEOUT,
            Deadline::after(Duration::from_millis(300)),
        )
        .await
        .unwrap();
    assert!(result.timed_out);
}

#[tokio::test]
async fn expired_deadline_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let deadline = Deadline::after(Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(5)).await;
    let err = TestScorer::default()
        .run(dir.path(), "true", TIMEOUT, deadline)
        .await
        .unwrap_err();
    assert!(matches!(err, ScorerError::DeadlineExceeded { .. }));
}

#[tokio::test]
async fn empty_parser_chain_never_parses() {
    let dir = tempfile::tempdir().unwrap();
    let script = "echo '=== 3 passed in 0.10s ==='";
    let result = TestScorer::new(ParserChain::empty())
        .run(dir.path(), script, TIMEOUT, Deadline::none())
        .await
        .unwrap();
    assert!(result.passed);
    assert!(result.parsed_framework.is_none());
}
