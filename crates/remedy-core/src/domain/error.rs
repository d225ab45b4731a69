//! Domain-level error taxonomy for Remedy.

use std::fmt;
use std::path::PathBuf;

use forge_client::ForgeError;
use markup_tree::ConvertError;
use remedy_exec::ExecError;
use serde::{Deserialize, Serialize};

use super::stage::Stage;

/// Flat classification of every failure an attempt can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ForkDenied,
    CloneFailed,
    AnalysisFailed,
    Parse,
    NotFound,
    AllocationExhausted,
    GitOperationFailed,
    SuggestionFailed,
    PermissionDenied,
    UnknownForge,
    TransientNetwork,
    Cancelled,
    CleanupFailed,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::ForkDenied => "fork_denied",
            ErrorKind::CloneFailed => "clone_failed",
            ErrorKind::AnalysisFailed => "analysis_failed",
            ErrorKind::Parse => "parse_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AllocationExhausted => "allocation_exhausted",
            ErrorKind::GitOperationFailed => "git_operation_failed",
            ErrorKind::SuggestionFailed => "suggestion_failed",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::UnknownForge => "unknown_forge_error",
            ErrorKind::TransientNetwork => "transient_network_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::CleanupFailed => "cleanup_failed",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remedy domain errors.
#[derive(Debug, thiserror::Error)]
pub enum RemedyError {
    #[error("invalid repository reference: {0}")]
    InvalidReference(String),

    #[error("repository is not reachable: {0}")]
    Unreachable(String),

    #[error("invalid patch target: {0}")]
    InvalidTarget(String),

    #[error("fork denied: {0}")]
    ForkDenied(String),

    #[error("clone failed: {message}")]
    CloneFailed { message: String, diagnostics: String },

    #[error("analysis failed: {message}")]
    AnalysisFailed { message: String, diagnostics: String },

    #[error("conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("no unused branch name after {attempts} attempts")]
    AllocationExhausted { attempts: usize },

    #[error("git {step} failed: {message}")]
    GitOperation {
        step: String,
        message: String,
        diagnostics: String,
    },

    #[error("suggestion service failed: {0}")]
    Suggestion(String),

    #[error("forge: {0}")]
    Forge(#[from] ForgeError),

    #[error("attempt cancelled")]
    Cancelled,

    #[error("lock on {path} not acquired: {reason}")]
    Lock { path: PathBuf, reason: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RemedyError {
    /// Classification reported to the orchestrator's caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemedyError::InvalidReference(_)
            | RemedyError::Unreachable(_)
            | RemedyError::InvalidTarget(_) => ErrorKind::Validation,
            RemedyError::ForkDenied(_) => ErrorKind::ForkDenied,
            RemedyError::CloneFailed { .. } => ErrorKind::CloneFailed,
            RemedyError::AnalysisFailed { .. } => ErrorKind::AnalysisFailed,
            RemedyError::Convert(e) if e.is_not_found() => ErrorKind::NotFound,
            RemedyError::Convert(ConvertError::Io { .. }) => ErrorKind::Internal,
            RemedyError::Convert(_) => ErrorKind::Parse,
            RemedyError::AllocationExhausted { .. } => ErrorKind::AllocationExhausted,
            RemedyError::GitOperation { .. } => ErrorKind::GitOperationFailed,
            RemedyError::Suggestion(_) => ErrorKind::SuggestionFailed,
            RemedyError::Forge(e) => forge_kind(e),
            RemedyError::Cancelled => ErrorKind::Cancelled,
            RemedyError::Lock { .. }
            | RemedyError::Io { .. }
            | RemedyError::Config(_)
            | RemedyError::Serialization(_)
            | RemedyError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Captured tool output, when the failure came from an external process.
    pub fn diagnostics(&self) -> &str {
        match self {
            RemedyError::CloneFailed { diagnostics, .. }
            | RemedyError::AnalysisFailed { diagnostics, .. }
            | RemedyError::GitOperation { diagnostics, .. } => diagnostics,
            _ => "",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RemedyError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn git(step: &str, err: ExecError) -> Self {
        RemedyError::GitOperation {
            step: step.to_string(),
            diagnostics: err.diagnostics().to_string(),
            message: err.to_string(),
        }
    }
}

fn forge_kind(err: &ForgeError) -> ErrorKind {
    match err {
        ForgeError::Validation { .. } => ErrorKind::Validation,
        ForgeError::NotFound { .. } => ErrorKind::NotFound,
        ForgeError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
        ForgeError::Unknown { .. } | ForgeError::Decode { .. } => ErrorKind::UnknownForge,
        ForgeError::TransientNetwork { .. } => ErrorKind::TransientNetwork,
        ForgeError::ForkDenied { .. } => ErrorKind::ForkDenied,
        ForgeError::Client(_) => ErrorKind::Internal,
    }
}

/// Result type for Remedy domain operations.
pub type Result<T> = std::result::Result<T, RemedyError>;

/// Structured description of the stage that aborted an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
    /// Captured stderr/stdout of the failing tool, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub diagnostics: String,
}

impl StageFailure {
    pub fn new(stage: Stage, err: &RemedyError) -> Self {
        Self {
            stage,
            kind: err.kind(),
            message: err.to_string(),
            diagnostics: err.diagnostics().to_string(),
        }
    }

    pub fn cancelled(stage: Stage) -> Self {
        Self::new(stage, &RemedyError::Cancelled)
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({}): {}", self.stage, self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_errors_split_into_parse_and_not_found() {
        let missing = RemedyError::Convert(ConvertError::NotFound {
            path: PathBuf::from("analysis/demo.xml"),
        });
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let malformed = RemedyError::Convert(ConvertError::Parse {
            message: "unexpected end of stream".into(),
        });
        assert_eq!(malformed.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_forge_errors_keep_their_classification() {
        let cases = [
            (
                ForgeError::Validation {
                    message: "x".into(),
                },
                ErrorKind::Validation,
            ),
            (
                ForgeError::PermissionDenied {
                    message: "x".into(),
                },
                ErrorKind::PermissionDenied,
            ),
            (
                ForgeError::Unknown {
                    status: 500,
                    message: "x".into(),
                },
                ErrorKind::UnknownForge,
            ),
            (
                ForgeError::TransientNetwork {
                    message: "x".into(),
                },
                ErrorKind::TransientNetwork,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(RemedyError::from(err).kind(), kind);
        }
    }

    #[test]
    fn test_stage_failure_carries_diagnostics() {
        let err = RemedyError::GitOperation {
            step: "push".into(),
            message: "git push exited with code 128".into(),
            diagnostics: "fatal: could not read from remote".into(),
        };
        let failure = StageFailure::new(Stage::Patch, &err);
        assert_eq!(failure.kind, ErrorKind::GitOperationFailed);
        assert_eq!(failure.diagnostics, "fatal: could not read from remote");
        assert!(failure.to_string().starts_with("patch failed (git_operation_failed)"));
    }
}
