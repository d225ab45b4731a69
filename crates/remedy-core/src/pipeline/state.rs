use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ErrorKind, Stage};

/// Position of an attempt in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    Validated,
    Forked,
    Cloned,
    Analyzed,
    Converted,
    Patched { changed: bool },
    Committed,
    Pushed,
    PrSubmitted,
    Aborted { stage: Stage, kind: ErrorKind },
    Cleaned,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Init => f.write_str("init"),
            PipelineState::Validated => f.write_str("validated"),
            PipelineState::Forked => f.write_str("forked"),
            PipelineState::Cloned => f.write_str("cloned"),
            PipelineState::Analyzed => f.write_str("analyzed"),
            PipelineState::Converted => f.write_str("converted"),
            PipelineState::Patched { changed: true } => f.write_str("patched(changed)"),
            PipelineState::Patched { changed: false } => f.write_str("patched(unchanged)"),
            PipelineState::Committed => f.write_str("committed"),
            PipelineState::Pushed => f.write_str("pushed"),
            PipelineState::PrSubmitted => f.write_str("pr_submitted"),
            PipelineState::Aborted { stage, kind } => write!(f, "aborted({stage}: {kind})"),
            PipelineState::Cleaned => f.write_str("cleaned"),
        }
    }
}

/// One state transition, as published on the progress channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    pub attempt_id: String,
    #[serde(flatten)]
    pub state: PipelineState,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_labels() {
        assert_eq!(PipelineState::Patched { changed: false }.to_string(), "patched(unchanged)");
        assert_eq!(
            PipelineState::Aborted {
                stage: Stage::Fork,
                kind: ErrorKind::ForkDenied
            }
            .to_string(),
            "aborted(fork: fork_denied)"
        );
    }

    #[test]
    fn test_event_json_shape() {
        let event = StageEvent {
            attempt_id: "a1".into(),
            state: PipelineState::Patched { changed: true },
            at: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["state"], "patched");
        assert_eq!(value["changed"], true);
        assert_eq!(value["attempt_id"], "a1");
    }
}
