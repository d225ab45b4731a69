//! Structured lifecycle events for remediation attempts.
//!
//! Every event carries an `event` field (`attempt.started`, `stage.started`,
//! `stage.finished`, `stage.failed`, `attempt.finished`, `cleanup.failed`)
//! so JSON logs can be filtered without parsing messages.

use tracing::{info, warn};

use crate::domain::{ErrorKind, Stage};

/// Span tagging every event of one attempt with its id and repository.
/// Attach it to the attempt future with `tracing::Instrument`.
pub fn attempt_span(attempt_id: &str, repository: &str) -> tracing::Span {
    tracing::info_span!("remedy.attempt", attempt_id = %attempt_id, repository = %repository)
}

pub fn emit_attempt_started(attempt_id: &str, reference: &str) {
    info!(event = "attempt.started", attempt_id = %attempt_id, reference = %reference);
}

pub fn emit_stage_started(stage: Stage) {
    info!(event = "stage.started", stage = %stage);
}

pub fn emit_stage_finished(stage: Stage, duration_ms: u64) {
    info!(event = "stage.finished", stage = %stage, duration_ms = duration_ms);
}

pub fn emit_stage_failed(stage: Stage, kind: ErrorKind, error: &dyn std::fmt::Display) {
    warn!(event = "stage.failed", stage = %stage, kind = %kind, error = %error);
}

/// `outcome` is a short label: `pr_opened`, `no_changes`, `nothing_to_do`, `aborted`.
pub fn emit_attempt_finished(attempt_id: &str, outcome: &str, duration_ms: u64) {
    info!(
        event = "attempt.finished",
        attempt_id = %attempt_id,
        outcome = outcome,
        duration_ms = duration_ms,
    );
}

/// Cleanup failures are reported here and nowhere else.
pub fn emit_cleanup_failed(path: &std::path::Path, error: &dyn std::fmt::Display) {
    warn!(event = "cleanup.failed", path = %path.display(), error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_span_create() {
        let span = attempt_span("attempt-1", "github.com/o/r");
        let _entered = span.enter();
        emit_stage_started(Stage::Fork);
        emit_stage_finished(Stage::Fork, 3);
    }
}
