//! One attempt: workspace, approach, snapshot, score.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rebench_core::aggregate::{combine, CombinedRecord};
use rebench_core::exec::Deadline;
use rebench_core::obs;
use rebench_core::scorer::{score_correctness, DiffScorer, InjectionScore, TestScorer};
use rebench_core::workspace::states::{ATTEMPT, BASELINE};
use rebench_core::{
    FileSet, NamedStates, ScoreRecord, ScorerError, TaskDescriptor, TestRunResult,
    WorkspaceError, WorkspaceManager,
};
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::approach::{Approach, ApproachOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttemptStatus {
    Completed,
    /// Clone, checkout, setup command or baseline verification failed.
    WorkspaceError,
    /// The approach's own tool preparation failed.
    SetupError,
    ApproachError,
    ScorerError,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Completed => "completed",
            AttemptStatus::WorkspaceError => "workspace_error",
            AttemptStatus::SetupError => "setup_error",
            AttemptStatus::ApproachError => "approach_error",
            AttemptStatus::ScorerError => "scorer_error",
        }
    }
}

/// Everything known about one attempt. Failures keep whatever was
/// recorded before the failing stage; scores are never filled in as zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub attempt_id: Uuid,
    pub task_id: String,
    pub approach: String,
    pub attempt: u32,
    pub status: AttemptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default)]
    pub states: NamedStates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepare_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approach_output: Option<ApproachOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_result: Option<TestRunResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_score: Option<ScoreRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection: Option<InjectionScore>,
    /// Injected files compared with the ground-truth files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection_correctness: Option<ScoreRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth_diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined: Option<CombinedRecord>,
}

impl AttemptRecord {
    pub(crate) fn new(task: &TaskDescriptor, approach: &str, attempt: u32) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            task_id: task.id.clone(),
            approach: approach.to_string(),
            attempt,
            status: AttemptStatus::Completed,
            error: None,
            started_at: Utc::now(),
            duration_ms: 0,
            states: NamedStates::new(),
            prepare_metadata: None,
            approach_output: None,
            test_result: None,
            diff_score: None,
            injection: None,
            injection_correctness: None,
            agent_diff: None,
            ground_truth_diff: None,
            combined: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }

    /// Label used when comparing attempts, e.g. `with-tool#1`.
    pub fn label(&self) -> String {
        format!("{}#{}", self.approach, self.attempt)
    }
}

/// Which stage ended the attempt.
#[derive(Debug, thiserror::Error)]
enum StageError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("tool setup failed: {0:#}")]
    Setup(anyhow::Error),

    #[error("approach failed: {0:#}")]
    Approach(anyhow::Error),

    #[error(transparent)]
    Scorer(#[from] ScorerError),
}

impl StageError {
    fn status(&self) -> AttemptStatus {
        match self {
            StageError::Workspace(_) => AttemptStatus::WorkspaceError,
            StageError::Setup(_) => AttemptStatus::SetupError,
            StageError::Approach(_) => AttemptStatus::ApproachError,
            StageError::Scorer(_) => AttemptStatus::ScorerError,
        }
    }
}

/// Attempt orchestrator.
pub struct AttemptPipeline {
    manager: Arc<WorkspaceManager>,
    test_scorer: TestScorer,
}

impl AttemptPipeline {
    pub fn new(manager: Arc<WorkspaceManager>) -> Self {
        Self {
            manager,
            test_scorer: TestScorer::default(),
        }
    }

    pub fn with_test_scorer(mut self, test_scorer: TestScorer) -> Self {
        self.test_scorer = test_scorer;
        self
    }

    /// Run `approach` on `task` once.
    ///
    /// Never fails: the returned record's status says how far it got.
    pub async fn run(
        &self,
        task: &TaskDescriptor,
        approach: &dyn Approach,
        attempt: u32,
        deadline: Deadline,
    ) -> AttemptRecord {
        let span = obs::attempt_span(&task.id, approach.name(), attempt);
        async move {
            obs::emit_attempt_started(&task.id, approach.name(), attempt);
            let start = Instant::now();
            let mut record = AttemptRecord::new(task, approach.name(), attempt);

            if let Err(err) = self.execute(task, approach, deadline, &mut record).await {
                obs::emit_attempt_failed(&task.id, err.status().as_str(), &err);
                record.status = err.status();
                record.error = Some(err.to_string());
            }

            record.duration_ms = start.elapsed().as_millis() as u64;
            obs::emit_attempt_finished(
                &task.id,
                approach.name(),
                record.status.as_str(),
                record.duration_ms,
            );
            record
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        task: &TaskDescriptor,
        approach: &dyn Approach,
        deadline: Deadline,
        record: &mut AttemptRecord,
    ) -> Result<(), StageError> {
        let manager = self.manager.as_ref();
        let mut workspace = manager.create_workspace(task, deadline).await?;
        let parent = workspace.parent_commit().to_string();
        record.states = workspace.states().clone();

        let prepared = approach
            .prepare(&workspace, deadline)
            .await
            .map_err(StageError::Setup)?;
        let baseline = match prepared {
            Some(metadata) => {
                record.prepare_metadata = Some(metadata);
                Some(manager.snapshot_state(&mut workspace, BASELINE, deadline).await?)
            }
            None => None,
        };
        record.states = workspace.states().clone();

        info!(approach = %approach.name(), "running approach");
        let output = approach
            .attempt(&workspace, task, deadline)
            .await
            .map_err(StageError::Approach)?;
        let approach_duration = output.duration_ms;
        let injected = output.injected_files.clone();
        record.approach_output = Some(output);

        let snapshot = manager.snapshot_state(&mut workspace, ATTEMPT, deadline).await?;
        record.states = workspace.states().clone();

        let test_result = self
            .test_scorer
            .run(
                workspace.path(),
                &task.test_command,
                manager.config().test_timeout(),
                deadline,
            )
            .await?;

        let diff_score = DiffScorer::new(manager)
            .score(
                workspace.path(),
                &task.target_commit,
                Some(snapshot.as_str()),
                baseline.as_deref(),
                deadline,
            )
            .await?;

        let diff_base = baseline.as_deref().unwrap_or(parent.as_str());
        record.agent_diff = Some(
            manager
                .unified_diff(workspace.path(), diff_base, &snapshot, deadline)
                .await
                .map_err(ScorerError::from)?,
        );
        record.ground_truth_diff = Some(
            manager
                .unified_diff(workspace.path(), &parent, &task.target_commit, deadline)
                .await
                .map_err(ScorerError::from)?,
        );

        if let Some(injected) = injected.filter(|files| !files.is_empty()) {
            let touched: FileSet = diff_score.agent_files.iter().map(String::as_str).collect();
            let truth: FileSet = diff_score.truth_files.iter().map(String::as_str).collect();
            record.injection = Some(InjectionScore::score(&injected, &touched));
            record.injection_correctness = Some(score_correctness(&injected, &truth));
        }

        record.combined =
            Some(combine(&test_result, &diff_score, None).with_duration_ms(approach_duration));
        info!(
            passed = test_result.passed,
            precision = diff_score.precision,
            recall = diff_score.recall,
            f1 = diff_score.f1,
            "attempt scored"
        );
        record.test_result = Some(test_result);
        record.diff_score = Some(diff_score);
        Ok(())
    }
}
