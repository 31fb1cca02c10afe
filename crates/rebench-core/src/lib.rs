//! rebench core library
//!
//! Replays historical commits to evaluate coding approaches: prepares an
//! isolated working copy at the parent of a known fix, snapshots what an
//! approach changed, and scores it with file-level overlap, test results
//! and a position-bias-resistant pairwise LLM judge.

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod exec;
pub mod fakes;
pub mod git;
pub mod judge;
pub mod metrics;
pub mod obs;
pub mod scorer;
pub mod telemetry;
pub mod workspace;

pub use aggregate::{combine, summarize, CombinedRecord, JudgeOutcome, JudgeTally, SummaryStats, WinCounts};

pub use config::{EvalConfig, JudgeConfig, DEFAULT_JUDGE_MODEL};

pub use domain::{
    f1, Dimension, DimensionScore, FileSet, JudgeError, JudgeResult, Judgement, Overlap,
    RawVerdict, RepoRef, ScoreRecord, ScorerError, ScorerResult, TaskDescriptor, TestCounts,
    TestRunResult, Winner, WorkspaceError, WorkspaceResult,
};

pub use exec::Deadline;

pub use judge::{AnthropicBackend, JudgeBackend, PairwiseJudge, PromptContext};

pub use scorer::{
    score_correctness, DiffScorer, InjectionScore, OutputParser, ParserChain, TestScorer,
};

pub use workspace::{NamedState, NamedStates, Workspace, WorkspaceManager};

/// Crate version, recorded alongside evaluation results.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
