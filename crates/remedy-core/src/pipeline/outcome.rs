use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::StageEvent;
use crate::domain::{RemediationAttempt, StageFailure};

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// A pull request is open for the change, new or pre-existing.
    PullRequestOpened {
        url: Option<String>,
        already_existed: bool,
    },
    /// The suggestion left the working tree unchanged; nothing was pushed.
    NoChanges,
    /// Nothing was sent for suggestion (no issues, or the file is too large).
    NothingToDo { reason: String },
    Aborted(StageFailure),
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::PullRequestOpened { .. } => "pr_opened",
            AttemptOutcome::NoChanges => "no_changes",
            AttemptOutcome::NothingToDo { .. } => "nothing_to_do",
            AttemptOutcome::Aborted(_) => "aborted",
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, AttemptOutcome::Aborted(_))
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            AttemptOutcome::Aborted(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Everything a caller learns about one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    pub attempt_id: String,
    /// The reference as given by the caller.
    pub repository: String,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<RemediationAttempt>,
    pub transitions: Vec<StageEvent>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AttemptReport {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Final state names in order, e.g. `["init", "validated", ...]`.
    pub fn state_trail(&self) -> Vec<String> {
        self.transitions.iter().map(|t| t.state.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, Stage};

    #[test]
    fn test_outcome_json_is_tagged() {
        let value = serde_json::to_value(AttemptOutcome::NoChanges).unwrap();
        assert_eq!(value["outcome"], "no_changes");

        let aborted = AttemptOutcome::Aborted(StageFailure {
            stage: Stage::Clone,
            kind: ErrorKind::CloneFailed,
            message: "clone failed".into(),
            diagnostics: String::new(),
        });
        let value = serde_json::to_value(&aborted).unwrap();
        assert_eq!(value["outcome"], "aborted");
        assert_eq!(value["stage"], "clone");
        assert_eq!(value["kind"], "clone_failed");
        assert_eq!(aborted.label(), "aborted");
    }
}
