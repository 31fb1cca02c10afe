//! Flip-and-draw pairwise comparison.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::error::{JudgeError, JudgeResult};
use crate::domain::judgement::{Judgement, RawVerdict};
use crate::exec::Deadline;
use crate::judge::backend::JudgeBackend;
use crate::judge::parse::parse_verdict;
use crate::judge::prompt::{render_prompt, PromptContext};
use crate::metrics::METRICS;
use crate::obs;

/// Judges two diffs twice, once per presentation order, and reconciles
/// the verdicts so neither side benefits from being shown first.
#[derive(Clone)]
pub struct PairwiseJudge {
    backend: Arc<dyn JudgeBackend>,
    call_timeout: Duration,
}

impl PairwiseJudge {
    pub fn new(backend: Arc<dyn JudgeBackend>, call_timeout: Duration) -> Self {
        Self {
            backend,
            call_timeout,
        }
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Compare `diff_a` with `diff_b`.
    ///
    /// Both orderings are requested concurrently. If either call or parse
    /// fails the whole comparison fails and the other result is dropped.
    pub async fn judge(
        &self,
        diff_a: &str,
        diff_b: &str,
        ctx: &PromptContext,
        deadline: Deadline,
    ) -> JudgeResult<Judgement> {
        if diff_a.trim().is_empty() {
            return Err(JudgeError::EmptyInput { side: "a" });
        }
        if diff_b.trim().is_empty() {
            return Err(JudgeError::EmptyInput { side: "b" });
        }
        if deadline.is_expired() {
            return Err(JudgeError::DeadlineExceeded {
                operation: "pairwise judgement".to_string(),
            });
        }

        let forward_prompt = render_prompt(ctx, diff_a, diff_b);
        let flipped_prompt = render_prompt(ctx, diff_b, diff_a);
        let limit = deadline.clamp(self.call_timeout);

        METRICS.add_judge_calls(2);
        let (forward, flipped) = tokio::try_join!(
            self.single_ordering(&forward_prompt, limit),
            self.single_ordering(&flipped_prompt, limit),
        )?;

        let unflipped = flipped.unflip();
        let judgement = Judgement::merge(&forward, &unflipped, self.backend.model());
        if judgement.bias_detected {
            tracing::info!(
                forward = %forward.winner,
                flipped = %unflipped.winner,
                "position bias detected, recording tie"
            );
            METRICS.inc_bias_detected();
        }
        obs::emit_judge_verdict(
            judgement.overall_winner.as_str(),
            judgement.bias_detected,
            &judgement.model,
        );
        Ok(judgement)
    }

    async fn single_ordering(&self, prompt: &str, limit: Duration) -> JudgeResult<RawVerdict> {
        let response = tokio::time::timeout(limit, self.backend.complete(prompt))
            .await
            .map_err(|_| JudgeError::Timeout {
                timeout_secs: limit.as_secs(),
            })??;
        parse_verdict(&response)
    }
}
