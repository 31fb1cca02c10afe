//! rebench runner
//!
//! Drives one evaluation attempt end to end:
//! - Creates a workspace at the parent of the target commit
//! - Lets an approach prepare its tooling and attempt the task
//! - Snapshots, scores and records the result
//! - Compares attempts pairwise with the LLM judge

pub mod approach;
pub mod attempt;
pub mod compare;

pub use approach::{Approach, ApproachOutput, CommandApproach};
pub use attempt::{AttemptPipeline, AttemptRecord, AttemptStatus};
pub use compare::{
    compare_against_reference, compare_all, compare_attempts, pick_best_attempt, Comparison,
    PairRequest,
};
