//! Error taxonomy for workspace, scorer and judge failures.
//!
//! Each component fails with its own enum so callers can tell "could not be
//! scored" apart from "scored zero". Every variant carries the raw subprocess
//! stderr or the exact text that failed to parse.

use std::path::PathBuf;

/// Git or environment failures. Fatal to the attempt, never retried.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("`{command}` failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("`{command}` timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot resolve parent of {commit}: {stderr}")]
    UnresolvedCommit { commit: String, stderr: String },

    #[error("commit {commit} is a root commit and has no parent")]
    RootCommit { commit: String },

    #[error("setup command `{command}` failed (exit {exit_code}): {output}")]
    SetupFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("baseline tests failed before the attempt started: `{command}`")]
    BaselineBroken { command: String },

    #[error("deadline exceeded before {operation}")]
    DeadlineExceeded { operation: String },

    #[error("could not lock mirror {path:?}: {reason}")]
    Lock { path: PathBuf, reason: String },

    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed scorer input. Fatal to the attempt.
#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("cannot read ground-truth commit {commit}: {source}")]
    GroundTruth {
        commit: String,
        #[source]
        source: WorkspaceError,
    },

    #[error("failed to spawn test command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("deadline exceeded before {operation}")]
    DeadlineExceeded { operation: String },

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// Failures of one pairwise comparison. Sibling comparisons are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("diff for side {side} is empty")]
    EmptyInput { side: &'static str },

    #[error("judge backend call failed: {0}")]
    Backend(String),

    #[error("judge call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("judge response is not valid JSON ({reason}): {text}")]
    InvalidJson { reason: String, text: String },

    #[error("judge response missing {field}: {text}")]
    MissingField { field: String, text: String },

    #[error("dimension '{dimension}' score for '{label}' must be a number in 1-5, got {value}")]
    ScoreOutOfRange {
        dimension: String,
        label: String,
        value: String,
    },

    #[error("overall_winner must be 'a', 'b', or 'tie', got '{0}'")]
    UnknownWinner(String),

    #[error("deadline exceeded before {operation}")]
    DeadlineExceeded { operation: String },
}

impl From<reqwest::Error> for JudgeError {
    fn from(err: reqwest::Error) -> Self {
        JudgeError::Backend(err.to_string())
    }
}

/// Result type for workspace operations.
pub type WorkspaceResult<T> = std::result::Result<T, WorkspaceError>;

/// Result type for scorer operations.
pub type ScorerResult<T> = std::result::Result<T, ScorerError>;

/// Result type for judge operations.
pub type JudgeResult<T> = std::result::Result<T, JudgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_error_carries_stderr() {
        let err = WorkspaceError::Git {
            command: "git checkout --force abc".to_string(),
            stderr: "fatal: reference is not a tree".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("git checkout --force abc"));
        assert!(msg.contains("reference is not a tree"));
    }

    #[test]
    fn test_ground_truth_error_wraps_source() {
        let err = ScorerError::GroundTruth {
            commit: "deadbeef".to_string(),
            source: WorkspaceError::Git {
                command: "git diff-tree".to_string(),
                stderr: "bad object".to_string(),
            },
        };
        assert!(err.to_string().contains("deadbeef"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_judge_error_keeps_offending_text() {
        let err = JudgeError::InvalidJson {
            reason: "expected value".to_string(),
            text: "not json at all".to_string(),
        };
        assert!(err.to_string().contains("not json at all"));
    }
}
