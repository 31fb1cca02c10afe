//! Domain models for rebench.
//!
//! Canonical definitions for the records passed between pipeline stages:
//! - `TaskDescriptor` / `RepoRef`: what is being replayed
//! - `FileSet` / `ScoreRecord`: file-level diff comparison
//! - `TestRunResult`: outcome of a test command
//! - `Judgement`: merged pairwise judge verdict

pub mod error;
pub mod judgement;
pub mod score;
pub mod task;
pub mod test_run;

pub use error::{
    JudgeError, JudgeResult, ScorerError, ScorerResult, WorkspaceError, WorkspaceResult,
};
pub use judgement::{Dimension, DimensionScore, Judgement, RawVerdict, Winner};
pub use score::{f1, FileSet, Overlap, ScoreRecord};
pub use task::{slug_dir_name, RepoRef, TaskDescriptor};
pub use test_run::{TestCounts, TestRunResult, TIMEOUT_EXIT_CODE, UNPARSED_FAILURES};
