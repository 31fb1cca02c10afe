//! Git subprocess plumbing shared by the workspace manager and scorers.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

use crate::domain::error::{WorkspaceError, WorkspaceResult};
use crate::exec::{run_captured, CommandOutput, Deadline};

/// Fixed identity for snapshot commits so hashes depend only on content.
pub const SNAPSHOT_ENV: &[(&str, &str)] = &[
    ("GIT_AUTHOR_NAME", "rebench"),
    ("GIT_AUTHOR_EMAIL", "rebench@localhost"),
    ("GIT_AUTHOR_DATE", "2000-01-01T00:00:00Z"),
    ("GIT_COMMITTER_NAME", "rebench"),
    ("GIT_COMMITTER_EMAIL", "rebench@localhost"),
    ("GIT_COMMITTER_DATE", "2000-01-01T00:00:00Z"),
];

/// One git invocation: arguments, working directory, limits.
#[derive(Debug)]
pub struct GitCall<'a> {
    dir: &'a Path,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    timeout: Duration,
    deadline: Deadline,
}

impl<'a> GitCall<'a> {
    pub fn new<I, S>(dir: &'a Path, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            dir,
            args: args.into_iter().map(|a| a.as_ref().to_string()).collect(),
            envs: Vec::new(),
            timeout: Duration::from_secs(120),
            deadline: Deadline::none(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn envs(mut self, envs: &[(&str, &str)]) -> Self {
        self.envs
            .extend(envs.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    /// Command line as shown in errors and logs.
    pub fn display(&self) -> String {
        format!("git {}", self.args.join(" "))
    }

    /// Run and return raw output regardless of exit status.
    pub async fn output(&self) -> WorkspaceResult<CommandOutput> {
        let command = self.display();
        if self.deadline.is_expired() {
            return Err(WorkspaceError::DeadlineExceeded { operation: command });
        }
        let limit = self.deadline.clamp(self.timeout);

        let mut cmd = Command::new("git");
        cmd.args(&self.args)
            .current_dir(self.dir)
            .env("GIT_TERMINAL_PROMPT", "0");
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }

        let out = run_captured(cmd, limit)
            .await
            .map_err(|source| WorkspaceError::Spawn {
                command: command.clone(),
                source,
            })?;

        if out.timed_out {
            tracing::warn!(command = %command, timeout_secs = limit.as_secs(), "git call timed out");
            return Err(WorkspaceError::Timeout {
                command,
                timeout_secs: limit.as_secs(),
            });
        }
        Ok(out)
    }

    /// Run and return trimmed stdout, failing on non-zero exit.
    pub async fn run(&self) -> WorkspaceResult<String> {
        let out = self.output().await?;
        if !out.success() {
            tracing::debug!(command = %self.display(), stderr = %out.stderr.trim(), "git call failed");
            return Err(WorkspaceError::Git {
                command: self.display(),
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out.stdout.trim().to_string())
    }
}
