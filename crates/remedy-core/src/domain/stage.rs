use std::fmt;

use serde::{Deserialize, Serialize};

/// Unit of work the orchestrator runs and reports failures against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Fork,
    Clone,
    Analyze,
    Convert,
    Suggest,
    Patch,
    Submit,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Fork => "fork",
            Stage::Clone => "clone",
            Stage::Analyze => "analyze",
            Stage::Convert => "convert",
            Stage::Suggest => "suggest",
            Stage::Patch => "patch",
            Stage::Submit => "submit",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
