use serde::{Deserialize, Serialize};

/// Severity reported by the analysis tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Unknown or missing severities are treated as `info`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Severity::Error,
            "warning" | "warn" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

/// One finding for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub message: String,
    pub source: String,
}

/// Findings for a single reported file, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIssues {
    /// Path as written by the analysis tool (absolute or repository-relative).
    pub path: String,
    pub issues: Vec<IssueRecord>,
}

/// Inclusive line range around an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueWindow {
    pub start: u32,
    pub end: u32,
}
