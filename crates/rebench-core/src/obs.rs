//! Structured lifecycle events for evaluation attempts.
//!
//! Every event carries an `event` field so JSON logs can be filtered
//! without parsing messages.

use tracing::info;

/// Span tagging every event of one attempt. Attach it with
/// `tracing::Instrument` so the attempt future stays `Send`.
pub fn attempt_span(task_id: &str, approach: &str, attempt: u32) -> tracing::Span {
    tracing::info_span!(
        "rebench.attempt",
        task_id = %task_id,
        approach = %approach,
        attempt = attempt
    )
}

pub fn emit_attempt_started(task_id: &str, approach: &str, attempt: u32) {
    info!(event = "attempt.started", task_id = %task_id, approach = %approach, attempt = attempt);
}

/// `status` is the attempt status label (`completed`, `workspace_error`, ...).
pub fn emit_attempt_finished(task_id: &str, approach: &str, status: &str, duration_ms: u64) {
    info!(
        event = "attempt.finished",
        task_id = %task_id,
        approach = %approach,
        status = %status,
        duration_ms = duration_ms,
    );
}

/// `fresh` is true when the mirror was cloned rather than updated.
pub fn emit_mirror_refreshed(slug: &str, fresh: bool, duration_ms: u64) {
    info!(event = "mirror.refreshed", slug = %slug, fresh = fresh, duration_ms = duration_ms);
}

pub fn emit_snapshot_taken(label: &str, commit: &str, created: bool) {
    info!(event = "snapshot.taken", label = %label, commit = %commit, created = created);
}

pub fn emit_judge_verdict(winner: &str, bias_detected: bool, model: &str) {
    info!(
        event = "judge.verdict",
        winner = %winner,
        bias_detected = bias_detected,
        model = %model,
    );
}

/// Warning-level event for a failure that ends one attempt.
pub fn emit_attempt_failed(task_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "attempt.failed", task_id = %task_id, stage = %stage, error = %error);
}
