//! Combining scorer outputs into one record and summarizing many records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::judgement::{Dimension, DimensionScore, Judgement, Winner};
use crate::domain::score::ScoreRecord;
use crate::domain::test_run::TestRunResult;

/// Judge fields carried on a combined record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeOutcome {
    pub overall_winner: Winner,
    pub bias_detected: bool,
    pub dimension_scores: BTreeMap<Dimension, DimensionScore>,
}

/// One attempt's scores, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedRecord {
    pub test_passed: bool,
    pub test_total: u64,
    pub test_failures: i64,
    pub test_timed_out: bool,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub exact_match: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgeOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl CombinedRecord {
    /// Attach how long the approach ran.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

pub fn combine(
    test: &TestRunResult,
    diff: &ScoreRecord,
    judgement: Option<&Judgement>,
) -> CombinedRecord {
    CombinedRecord {
        test_passed: test.passed,
        test_total: test.total,
        test_failures: test.failures,
        test_timed_out: test.timed_out,
        precision: diff.precision,
        recall: diff.recall,
        f1: diff.f1,
        exact_match: diff.exact_match,
        judge: judgement.map(|j| JudgeOutcome {
            overall_winner: j.overall_winner,
            bias_detected: j.bias_detected,
            dimension_scores: j.dimension_scores.clone(),
        }),
        duration_ms: None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinCounts {
    pub a: u64,
    pub b: u64,
    pub tie: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeTally {
    pub count: u64,
    pub wins: WinCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub count: u64,
    pub test_pass_rate: f64,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub mean_f1: f64,
    /// Over records that carry a duration; 0 when none do.
    pub mean_duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgeTally>,
}

/// Summary statistics over `records`. Empty input gives all zeros.
pub fn summarize(records: &[CombinedRecord]) -> SummaryStats {
    if records.is_empty() {
        return SummaryStats::default();
    }
    let n = records.len() as f64;
    let passes = records.iter().filter(|r| r.test_passed).count() as f64;

    let durations: Vec<f64> = records
        .iter()
        .filter_map(|r| r.duration_ms)
        .map(|d| d as f64)
        .collect();

    let mut tally = JudgeTally::default();
    for judge in records.iter().filter_map(|r| r.judge.as_ref()) {
        tally.count += 1;
        match judge.overall_winner {
            Winner::A => tally.wins.a += 1,
            Winner::B => tally.wins.b += 1,
            Winner::Tie => tally.wins.tie += 1,
        }
    }

    SummaryStats {
        count: records.len() as u64,
        test_pass_rate: passes / n,
        mean_precision: mean(records.iter().map(|r| r.precision)),
        mean_recall: mean(records.iter().map(|r| r.recall)),
        mean_f1: mean(records.iter().map(|r| r.f1)),
        mean_duration_ms: mean(durations.into_iter()),
        judge: (tally.count > 0).then_some(tally),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
