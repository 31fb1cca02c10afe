//! File-level comparison of an attempt against the ground-truth commit.

use std::path::Path;

use crate::domain::error::{ScorerError, ScorerResult};
use crate::domain::score::ScoreRecord;
use crate::exec::Deadline;
use crate::workspace::WorkspaceManager;

pub struct DiffScorer<'a> {
    manager: &'a WorkspaceManager,
}

impl<'a> DiffScorer<'a> {
    pub fn new(manager: &'a WorkspaceManager) -> Self {
        Self { manager }
    }

    /// Compare the files changed between `baseline` (default
    /// `ground_truth^`) and `snapshot` (default the working tree) with the
    /// files the ground-truth commit touched. Paths under the configured
    /// infrastructure prefixes are ignored on both sides.
    pub async fn score(
        &self,
        workspace: &Path,
        ground_truth: &str,
        snapshot: Option<&str>,
        baseline: Option<&str>,
        deadline: Deadline,
    ) -> ScorerResult<ScoreRecord> {
        let prefixes = &self.manager.config().infra_prefixes;

        let truth = self
            .manager
            .diff_file_set_in_commit(workspace, ground_truth, deadline)
            .await
            .map_err(|source| ScorerError::GroundTruth {
                commit: ground_truth.to_string(),
                source,
            })?
            .without_prefixes(prefixes);

        let base = baseline
            .map(str::to_string)
            .unwrap_or_else(|| format!("{ground_truth}^"));
        let agent = self
            .manager
            .diff_file_set(workspace, &base, snapshot, deadline)
            .await?
            .without_prefixes(prefixes);

        let record = ScoreRecord::compare(&agent, &truth);
        tracing::info!(
            ground_truth = %ground_truth,
            agent_files = agent.len(),
            truth_files = truth.len(),
            precision = record.precision,
            recall = record.recall,
            f1 = record.f1,
            "diff scored"
        );
        Ok(record)
    }
}
