//! Approaches: the things being evaluated.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rebench_core::exec::{run_captured, shell, Deadline};
use rebench_core::{FileSet, TaskDescriptor, Workspace};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Characters of approach output kept on the record.
const OUTPUT_TAIL_CHARS: usize = 5000;

/// What an approach reports back after attempting a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproachOutput {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration_ms: u64,
    /// Context files the approach's tooling injected, workspace-relative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injected_files: Option<FileSet>,
    #[serde(default)]
    pub output_tail: String,
}

#[async_trait]
pub trait Approach: Send + Sync {
    fn name(&self) -> &str;

    /// Tool setup run after the workspace is ready and before the attempt.
    ///
    /// `Ok(None)` means nothing was prepared. `Ok(Some(metadata))` means the
    /// workspace may have changed, so the pipeline snapshots a baseline and
    /// scores the attempt against it.
    async fn prepare(
        &self,
        _workspace: &Workspace,
        _deadline: Deadline,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(None)
    }

    async fn attempt(
        &self,
        workspace: &Workspace,
        task: &TaskDescriptor,
        deadline: Deadline,
    ) -> anyhow::Result<ApproachOutput>;
}

/// Runs a shell command in the workspace.
///
/// The command sees `REBENCH_TASK_ID`, `REBENCH_TASK_DESCRIPTION` and
/// `REBENCH_INJECTED_FILES`, a path outside the workspace where it may write
/// one injected context file per line.
#[derive(Debug, Clone)]
pub struct CommandApproach {
    name: String,
    command: String,
    prepare_command: Option<String>,
    timeout: Duration,
    prepare_timeout: Duration,
}

impl CommandApproach {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            prepare_command: None,
            timeout: Duration::from_secs(3600),
            prepare_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_prepare_command(mut self, command: impl Into<String>) -> Self {
        self.prepare_command = Some(command.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_prepare_timeout(mut self, timeout: Duration) -> Self {
        self.prepare_timeout = timeout;
        self
    }
}

#[async_trait]
impl Approach for CommandApproach {
    fn name(&self) -> &str {
        &self.name
    }

    async fn prepare(
        &self,
        workspace: &Workspace,
        deadline: Deadline,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        let Some(command) = &self.prepare_command else {
            return Ok(None);
        };
        if deadline.is_expired() {
            anyhow::bail!("deadline exceeded before prepare command `{command}`");
        }
        let out = run_captured(
            shell(command, workspace.path()),
            deadline.clamp(self.prepare_timeout),
        )
        .await
        .with_context(|| format!("failed to spawn prepare command `{command}`"))?;

        if !out.success() {
            anyhow::bail!(
                "prepare command `{}` failed (exit {:?}, timed out: {}): {}",
                command,
                out.exit_code,
                out.timed_out,
                tail(&out.combined())
            );
        }
        Ok(Some(json!({
            "command": command,
            "durationMs": out.duration_ms,
        })))
    }

    async fn attempt(
        &self,
        workspace: &Workspace,
        task: &TaskDescriptor,
        deadline: Deadline,
    ) -> anyhow::Result<ApproachOutput> {
        if deadline.is_expired() {
            anyhow::bail!("deadline exceeded before approach `{}`", self.name);
        }
        let scratch = tempfile::Builder::new()
            .prefix("rebench-approach-")
            .tempdir()
            .context("failed to create approach scratch dir")?;
        let injected_path = scratch.path().join("injected_files.txt");

        let mut cmd = shell(&self.command, workspace.path());
        cmd.env("REBENCH_TASK_ID", &task.id)
            .env("REBENCH_TASK_DESCRIPTION", &task.description)
            .env("REBENCH_INJECTED_FILES", &injected_path);

        let out = run_captured(cmd, deadline.clamp(self.timeout))
            .await
            .with_context(|| format!("failed to spawn approach command `{}`", self.command))?;

        if out.timed_out {
            tracing::warn!(approach = %self.name, "approach command timed out");
        }

        let injected_files = read_injected_files(&injected_path, workspace.path()).await?;
        Ok(ApproachOutput {
            exit_code: out.exit_code,
            timed_out: out.timed_out,
            duration_ms: out.duration_ms,
            injected_files,
            output_tail: tail(&out.combined()).to_string(),
        })
    }
}

/// `None` when the approach wrote nothing. Absolute paths inside the
/// workspace are made workspace-relative.
async fn read_injected_files(path: &Path, workspace: &Path) -> anyhow::Result<Option<FileSet>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let files: FileSet = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            Path::new(line)
                .strip_prefix(workspace)
                .map(|rel| rel.to_string_lossy().into_owned())
                .unwrap_or_else(|_| line.to_string())
        })
        .collect();
    Ok((!files.is_empty()).then_some(files))
}

fn tail(text: &str) -> &str {
    let skip = text.chars().count().saturating_sub(OUTPUT_TAIL_CHARS);
    match text.char_indices().nth(skip) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}
