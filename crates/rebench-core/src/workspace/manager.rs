//! Isolated working copies at a known-good parent commit.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::EvalConfig;
use crate::domain::error::{WorkspaceError, WorkspaceResult};
use crate::domain::score::FileSet;
use crate::domain::task::{slug_dir_name, RepoRef, TaskDescriptor};
use crate::exec::{run_captured, shell, Deadline};
use crate::git::{GitCall, SNAPSHOT_ENV};
use crate::metrics::METRICS;
use crate::obs;
use crate::workspace::mirror::MirrorCache;
use crate::workspace::states::{self, NamedStates};

/// Bytes of command output kept in setup errors and logs.
const OUTPUT_TAIL: usize = 4000;

/// One attempt's working copy. Dropping it deletes the directory.
#[derive(Debug)]
pub struct Workspace {
    _root: TempDir,
    path: PathBuf,
    repo: RepoRef,
    parent_commit: String,
    states: NamedStates,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// Resolved hash of `target_commit^`.
    pub fn parent_commit(&self) -> &str {
        &self.parent_commit
    }

    pub fn states(&self) -> &NamedStates {
        &self.states
    }

    pub fn record_state(&mut self, label: impl Into<String>, commit: impl Into<String>) {
        self.states.record(label, commit);
    }
}

#[derive(Debug)]
pub struct WorkspaceManager {
    config: EvalConfig,
    mirrors: MirrorCache,
}

impl WorkspaceManager {
    pub fn new(config: EvalConfig) -> Self {
        let mirrors = MirrorCache::new(&config);
        Self { config, mirrors }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub async fn ensure_cached_mirror(&self, slug: &str, deadline: Deadline) -> WorkspaceResult<PathBuf> {
        self.mirrors.ensure(slug, deadline).await
    }

    /// Clone `slug` from its local mirror into `dest_root/<owner>--<repo>`
    /// and point `origin` back at the upstream URL.
    pub async fn clone_workspace(
        &self,
        slug: &str,
        dest_root: &Path,
        deadline: Deadline,
    ) -> WorkspaceResult<PathBuf> {
        let mirror = self.ensure_cached_mirror(slug, deadline).await?;
        let dest = dest_root.join(slug_dir_name(slug));
        let mirror_arg = mirror.to_string_lossy().into_owned();
        let dest_arg = dest.to_string_lossy().into_owned();

        GitCall::new(dest_root, ["clone", mirror_arg.as_str(), dest_arg.as_str()])
            .timeout(self.config.clone_timeout())
            .deadline(deadline)
            .run()
            .await?;

        let upstream = self.config.remote_url(slug);
        self.git(&dest, ["remote", "set-url", "origin", upstream.as_str()], deadline)
            .run()
            .await?;
        Ok(dest)
    }

    /// Resolve `target_commit^` and force-checkout it. Returns the parent hash.
    pub async fn checkout_parent(
        &self,
        workspace: &Path,
        target_commit: &str,
        deadline: Deadline,
    ) -> WorkspaceResult<String> {
        let parent_rev = format!("{target_commit}^");
        let parent = match self.git(workspace, ["rev-parse", parent_rev.as_str()], deadline).run().await {
            Ok(parent) => parent,
            Err(WorkspaceError::Git { stderr, .. }) => {
                return Err(self.classify_unresolved(workspace, target_commit, stderr, deadline).await)
            }
            Err(err) => return Err(err),
        };

        self.git(workspace, ["checkout", "--force", parent.as_str()], deadline)
            .run()
            .await?;
        tracing::debug!(target = %target_commit, parent = %parent, "checked out parent");
        Ok(parent)
    }

    /// A target that resolves on its own but has no parent is a root commit.
    async fn classify_unresolved(
        &self,
        workspace: &Path,
        target_commit: &str,
        stderr: String,
        deadline: Deadline,
    ) -> WorkspaceError {
        let target_rev = format!("{target_commit}^{{commit}}");
        let target_exists = self
            .git(workspace, ["rev-parse", "--verify", "--quiet", target_rev.as_str()], deadline)
            .run()
            .await
            .is_ok();
        if target_exists {
            WorkspaceError::RootCommit {
                commit: target_commit.to_string(),
            }
        } else {
            WorkspaceError::UnresolvedCommit {
                commit: target_commit.to_string(),
                stderr,
            }
        }
    }

    /// Run the test command on the untouched checkout.
    ///
    /// `Ok(false)` on non-zero exit or timeout. Errors only when the command
    /// cannot be spawned or the deadline already passed.
    pub async fn verify_environment(
        &self,
        workspace: &Path,
        test_command: &str,
        timeout: std::time::Duration,
        deadline: Deadline,
    ) -> WorkspaceResult<bool> {
        if deadline.is_expired() {
            return Err(WorkspaceError::DeadlineExceeded {
                operation: "environment verification".to_string(),
            });
        }
        let out = run_captured(shell(test_command, workspace), deadline.clamp(timeout))
            .await
            .map_err(|source| WorkspaceError::Spawn {
                command: test_command.to_string(),
                source,
            })?;
        if !out.success() {
            tracing::warn!(
                command = %test_command,
                exit_code = ?out.exit_code,
                timed_out = out.timed_out,
                output = %tail(&out.combined()),
                "baseline verification failed"
            );
        }
        Ok(out.success())
    }

    /// Commit the full workspace state and return its hash.
    ///
    /// With nothing to commit the current HEAD is returned, so repeated
    /// calls without changes yield the same hash.
    pub async fn snapshot(&self, workspace: &Path, deadline: Deadline) -> WorkspaceResult<String> {
        self.git(workspace, ["add", "-A"], deadline).run().await?;
        let status = self.git(workspace, ["status", "--porcelain"], deadline).run().await?;
        let created = !status.is_empty();
        if created {
            self.git(
                workspace,
                ["commit", "--allow-empty", "--no-verify", "--no-gpg-sign", "-q", "-m", "rebench snapshot"],
                deadline,
            )
            .envs(SNAPSHOT_ENV)
            .run()
            .await?;
            METRICS.inc_snapshots_created();
        }
        let head = self.git(workspace, ["rev-parse", "HEAD"], deadline).run().await?;
        tracing::debug!(commit = %head, created, "snapshot");
        Ok(head)
    }

    /// Snapshot and record the result under `label`.
    pub async fn snapshot_state(
        &self,
        workspace: &mut Workspace,
        label: &str,
        deadline: Deadline,
    ) -> WorkspaceResult<String> {
        let before = workspace.states.iter().last().map(|s| s.commit.clone());
        let commit = self.snapshot(&workspace.path, deadline).await?;
        obs::emit_snapshot_taken(label, &commit, before.as_deref() != Some(commit.as_str()));
        workspace.record_state(label, commit.clone());
        Ok(commit)
    }

    /// Paths changed between `base` and `head`. With `head` as `None` this
    /// is the working tree, untracked files included.
    pub async fn diff_file_set(
        &self,
        workspace: &Path,
        base: &str,
        head: Option<&str>,
        deadline: Deadline,
    ) -> WorkspaceResult<FileSet> {
        let mut args = vec!["diff", "--name-only", base];
        args.extend(head);
        let changed = self.git(workspace, args, deadline).run().await?;
        if head.is_some() {
            return Ok(FileSet::from_name_only(&changed));
        }
        let untracked = self
            .git(workspace, ["ls-files", "--others", "--exclude-standard"], deadline)
            .run()
            .await?;
        Ok(FileSet::from_name_only(&format!("{changed}\n{untracked}")))
    }

    /// Paths touched by `commit` itself. Root commits diff against the
    /// empty tree.
    pub async fn diff_file_set_in_commit(
        &self,
        workspace: &Path,
        commit: &str,
        deadline: Deadline,
    ) -> WorkspaceResult<FileSet> {
        let out = self
            .git(
                workspace,
                ["diff-tree", "--no-commit-id", "--name-only", "-r", "--root", commit],
                deadline,
            )
            .run()
            .await?;
        Ok(FileSet::from_name_only(&out))
    }

    pub async fn unified_diff(
        &self,
        workspace: &Path,
        base: &str,
        head: &str,
        deadline: Deadline,
    ) -> WorkspaceResult<String> {
        let out = self.git(workspace, ["diff", base, head], deadline).output().await?;
        if !out.success() {
            return Err(WorkspaceError::Git {
                command: format!("git diff {base} {head}"),
                stderr: out.stderr.trim().to_string(),
            });
        }
        // Untrimmed: trailing context lines are part of the patch.
        Ok(out.stdout)
    }

    /// Fresh working copy for `task`, checked out at the parent commit,
    /// set up and verified.
    pub async fn create_workspace(
        &self,
        task: &TaskDescriptor,
        deadline: Deadline,
    ) -> WorkspaceResult<Workspace> {
        task.validate()?;
        let prefix = format!("rebench-{}-", task.id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let root = match &self.config.workspace_root {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        };

        let path = self
            .clone_workspace(&task.repo_slug, root.path(), deadline)
            .await?;
        let parent_commit = self
            .checkout_parent(&path, &task.target_commit, deadline)
            .await?;

        let mut states = NamedStates::new();
        states.record(states::PARENT, parent_commit.clone());

        if let Some(setup) = &task.setup_command {
            self.run_setup(&path, setup, deadline).await?;
        }

        if self.config.skip_verify {
            tracing::debug!(task_id = %task.id, "baseline verification skipped");
        } else if !self
            .verify_environment(&path, &task.test_command, self.config.verify_timeout(), deadline)
            .await?
        {
            return Err(WorkspaceError::BaselineBroken {
                command: task.test_command.clone(),
            });
        }

        METRICS.inc_workspaces_created();
        tracing::info!(task_id = %task.id, path = %path.display(), parent = %parent_commit, "workspace ready");
        Ok(Workspace {
            _root: root,
            path,
            repo: task.repo_ref(),
            parent_commit,
            states,
        })
    }

    async fn run_setup(&self, workspace: &Path, command: &str, deadline: Deadline) -> WorkspaceResult<()> {
        if deadline.is_expired() {
            return Err(WorkspaceError::DeadlineExceeded {
                operation: format!("setup command `{command}`"),
            });
        }
        let out = run_captured(shell(command, workspace), deadline.clamp(self.config.setup_timeout()))
            .await
            .map_err(|source| WorkspaceError::Spawn {
                command: command.to_string(),
                source,
            })?;
        if out.success() {
            return Ok(());
        }
        Err(WorkspaceError::SetupFailed {
            command: command.to_string(),
            exit_code: out.exit_code.unwrap_or(-1),
            output: tail(&out.combined()).to_string(),
        })
    }

    fn git<'a, I, S>(&self, dir: &'a Path, args: I, deadline: Deadline) -> GitCall<'a>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        GitCall::new(dir, args)
            .timeout(self.config.git_timeout())
            .deadline(deadline)
    }
}

fn tail(text: &str) -> &str {
    if text.len() <= OUTPUT_TAIL {
        return text;
    }
    let mut start = text.len() - OUTPUT_TAIL;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
