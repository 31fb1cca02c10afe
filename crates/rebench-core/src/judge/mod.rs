//! Pairwise LLM judge with flip-and-draw position-bias mitigation.
//!
//! - [`backend`] : `JudgeBackend` trait and the Anthropic Messages client
//! - [`prompt`]  : rubric prompt rendering
//! - [`parse`]   : JSON extraction and validation into `RawVerdict`
//! - [`pairwise`]: `PairwiseJudge`, the forward/flipped/merge driver

pub mod backend;
pub mod pairwise;
pub mod parse;
pub mod prompt;

pub use backend::{AnthropicBackend, JudgeBackend};
pub use pairwise::PairwiseJudge;
pub use parse::{extract_json, parse_verdict};
pub use prompt::{render_prompt, PromptContext};
