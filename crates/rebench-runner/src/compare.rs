//! Pairwise comparison of finished attempts.

use futures::future::join_all;
use rebench_core::exec::Deadline;
use rebench_core::judge::{PairwiseJudge, PromptContext};
use rebench_core::{JudgeResult, Judgement, TaskDescriptor};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::attempt::AttemptRecord;

/// One requested comparison: `a` against `b` on `task`.
#[derive(Debug, Clone, Copy)]
pub struct PairRequest<'a> {
    pub task: &'a TaskDescriptor,
    pub a: &'a AttemptRecord,
    pub b: &'a AttemptRecord,
}

/// Outcome of one comparison. Exactly one of `judgement` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub task_id: String,
    pub a: String,
    pub b: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgement: Option<Judgement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn prompt_context(task: &TaskDescriptor) -> PromptContext {
    PromptContext::new(&task.repo_slug, &task.description)
        .with_language(task.language.clone().unwrap_or_default())
}

/// Judge the agent diffs of two attempts. An attempt without a diff counts
/// as empty input.
pub async fn compare_attempts(
    judge: &PairwiseJudge,
    task: &TaskDescriptor,
    a: &AttemptRecord,
    b: &AttemptRecord,
    deadline: Deadline,
) -> JudgeResult<Judgement> {
    judge
        .judge(
            a.agent_diff.as_deref().unwrap_or_default(),
            b.agent_diff.as_deref().unwrap_or_default(),
            &prompt_context(task),
            deadline,
        )
        .await
}

/// Judge the real fix (side `a`) against an attempt's diff (side `b`).
pub async fn compare_against_reference(
    judge: &PairwiseJudge,
    task: &TaskDescriptor,
    attempt: &AttemptRecord,
    deadline: Deadline,
) -> JudgeResult<Judgement> {
    judge
        .judge(
            attempt.ground_truth_diff.as_deref().unwrap_or_default(),
            attempt.agent_diff.as_deref().unwrap_or_default(),
            &prompt_context(task),
            deadline,
        )
        .await
}

/// Run all comparisons concurrently. Each fails on its own; results come
/// back in request order.
pub async fn compare_all(
    judge: &PairwiseJudge,
    pairs: &[PairRequest<'_>],
    deadline: Deadline,
) -> Vec<Comparison> {
    let runs = pairs.iter().map(|pair| async move {
        let outcome = compare_attempts(judge, pair.task, pair.a, pair.b, deadline).await;
        let (judgement, error) = match outcome {
            Ok(judgement) => (Some(judgement), None),
            Err(err) => {
                warn!(task_id = %pair.task.id, a = %pair.a.label(), b = %pair.b.label(), error = %err, "comparison failed");
                (None, Some(err.to_string()))
            }
        };
        Comparison {
            task_id: pair.task.id.clone(),
            a: pair.a.label(),
            b: pair.b.label(),
            judgement,
            error,
        }
    });
    join_all(runs).await
}

/// Best of several attempts of one approach on one task: passing attempts
/// first, then highest F1; the earliest attempt wins ties. Only completed
/// attempts are considered.
pub fn pick_best_attempt(runs: &[AttemptRecord]) -> Option<&AttemptRecord> {
    let completed: Vec<&AttemptRecord> = runs.iter().filter(|r| r.is_completed()).collect();
    let passing: Vec<&AttemptRecord> = completed
        .iter()
        .copied()
        .filter(|r| r.test_result.as_ref().is_some_and(|t| t.passed))
        .collect();
    let pool = if passing.is_empty() { completed } else { passing };

    let f1 = |r: &AttemptRecord| r.diff_score.as_ref().map_or(0.0, |d| d.f1);
    pool.into_iter().fold(None, |best, candidate| match best {
        Some(current) if f1(current) >= f1(candidate) => Some(current),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::attempt::AttemptStatus;
    use rebench_core::fakes::ScriptedJudgeBackend;
    use rebench_core::{FileSet, ScoreRecord, TestRunResult, Winner};

    fn attempt(n: u32, passed: bool, agent: &[&str]) -> AttemptRecord {
        let task = TaskDescriptor::new("t-1", "acme/widgets", "abcdef1", "true", "fix it").unwrap();
        let mut record = AttemptRecord::new(&task, "cmd", n);
        let truth: FileSet = ["a.rs", "b.rs"].into_iter().collect();
        let agent: FileSet = agent.iter().copied().collect();
        record.diff_score = Some(ScoreRecord::compare(&agent, &truth));
        record.test_result = Some(TestRunResult::from_run(
            Some(if passed { 0 } else { 1 }),
            false,
            String::new(),
            None,
            1,
        ));
        record
    }

    #[test]
    fn passing_attempt_beats_higher_f1() {
        let runs = vec![attempt(0, false, &["a.rs", "b.rs"]), attempt(1, true, &["a.rs"])];
        assert_eq!(pick_best_attempt(&runs).unwrap().attempt, 1);
    }

    #[test]
    fn highest_f1_then_earliest() {
        let runs = vec![
            attempt(0, true, &["a.rs"]),
            attempt(1, true, &["a.rs", "b.rs"]),
            attempt(2, true, &["a.rs", "b.rs"]),
        ];
        assert_eq!(pick_best_attempt(&runs).unwrap().attempt, 1);
    }

    #[test]
    fn failed_attempts_are_ignored() {
        let mut broken = attempt(0, true, &["a.rs", "b.rs"]);
        broken.status = AttemptStatus::WorkspaceError;
        assert!(pick_best_attempt(&[broken]).is_none());
        assert!(pick_best_attempt(&[]).is_none());
    }

    fn verdict(winner: &str) -> String {
        format!(
            r#"{{"dimensions": {{
                "consistency": {{"a": 4, "b": 3}},
                "completeness": {{"a": 4, "b": 3}},
                "minimality": {{"a": 4, "b": 3}}
            }}, "overall_winner": "{winner}", "reasoning": "r"}}"#
        )
    }

    #[tokio::test]
    async fn compare_all_keeps_order_and_isolates_failures() {
        // Prefers whichever solution contains `good`, in either position.
        let backend = ScriptedJudgeBackend::from_fn("m", |prompt| {
            let a = prompt.find("+good").unwrap_or(usize::MAX);
            let b = prompt.find("+meh").unwrap_or(usize::MAX);
            Ok(verdict(if a < b { "a" } else { "b" }))
        });
        let judge = PairwiseJudge::new(Arc::new(backend), Duration::from_secs(5));
        let task = TaskDescriptor::new("t-1", "acme/widgets", "abcdef1", "true", "fix it").unwrap();

        let mut good = attempt(0, true, &["a.rs"]);
        good.agent_diff = Some("+good\n".into());
        let mut meh = attempt(1, true, &["a.rs"]);
        meh.agent_diff = Some("+meh\n".into());
        let empty = attempt(2, true, &[]);

        let pairs = [
            PairRequest { task: &task, a: &good, b: &meh },
            PairRequest { task: &task, a: &meh, b: &empty },
        ];
        let results = compare_all(&judge, &pairs, Deadline::none()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].a, "cmd#0");
        let first = results[0].judgement.as_ref().unwrap();
        assert_eq!(first.overall_winner, Winner::A);
        assert!(!first.bias_detected);
        assert!(results[1].judgement.is_none());
        assert!(results[1].error.as_deref().unwrap().contains("b"));
    }
}
