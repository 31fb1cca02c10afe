//! Task descriptors and repository references.

use serde::{Deserialize, Serialize};

use crate::domain::error::{WorkspaceError, WorkspaceResult};

/// A repository slug (`owner/repo`) plus the commit whose fix is replayed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepoRef {
    pub slug: String,
    pub target_commit: String,
}

impl RepoRef {
    pub fn new(slug: impl Into<String>, target_commit: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            target_commit: target_commit.into(),
        }
    }
}

/// `owner/repo` becomes `owner--repo`.
pub fn slug_dir_name(slug: &str) -> String {
    slug.replace('/', "--")
}

/// One evaluation task: replay `target_commit` and check the fix with
/// `test_command`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescriptor {
    pub id: String,
    pub repo_slug: String,
    pub target_commit: String,
    pub test_command: String,
    pub description: String,
    /// Run once after checkout, before baseline verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl TaskDescriptor {
    /// Build and validate a task descriptor.
    pub fn new(
        id: impl Into<String>,
        repo_slug: impl Into<String>,
        target_commit: impl Into<String>,
        test_command: impl Into<String>,
        description: impl Into<String>,
    ) -> WorkspaceResult<Self> {
        let task = Self {
            id: id.into(),
            repo_slug: repo_slug.into(),
            target_commit: target_commit.into(),
            test_command: test_command.into(),
            description: description.into(),
            setup_command: None,
            language: None,
        };
        task.validate()?;
        Ok(task)
    }

    pub fn with_setup_command(mut self, command: impl Into<String>) -> Self {
        self.setup_command = Some(command.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Check the descriptor once at the boundary where it enters the process.
    pub fn validate(&self) -> WorkspaceResult<()> {
        if self.id.trim().is_empty() {
            return Err(WorkspaceError::InvalidTask("id must not be empty".into()));
        }
        // The id becomes part of the workspace directory name.
        let path_safe = self
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !path_safe || self.id.chars().all(|c| c == '.') {
            return Err(WorkspaceError::InvalidTask(format!(
                "id may only contain ASCII letters, digits, '-', '_' and '.', got '{}'",
                self.id
            )));
        }
        let mut parts = self.repo_slug.split('/');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty()
        );
        if !well_formed {
            return Err(WorkspaceError::InvalidTask(format!(
                "{}: repo slug must look like 'owner/repo', got '{}'",
                self.id, self.repo_slug
            )));
        }
        if self.target_commit.len() < 7 || !self.target_commit.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(WorkspaceError::InvalidTask(format!(
                "{}: commit must be a hex hash of at least 7 chars, got '{}'",
                self.id, self.target_commit
            )));
        }
        if self.test_command.trim().is_empty() {
            return Err(WorkspaceError::InvalidTask(format!(
                "{}: test command must not be empty",
                self.id
            )));
        }
        if self.description.trim().is_empty() {
            return Err(WorkspaceError::InvalidTask(format!(
                "{}: description must not be empty",
                self.id
            )));
        }
        Ok(())
    }

    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.repo_slug, &self.target_commit)
    }
}
