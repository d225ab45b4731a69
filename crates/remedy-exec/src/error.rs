//! Error types for remedy-exec

use thiserror::Error;

/// Errors produced by the process gateway.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The command had no program name
    #[error("empty command")]
    EmptyCommand,

    /// The program could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command exceeded its timeout and was killed
    #[error("{command} timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },

    /// The command ran but exited non-zero
    #[error("{command} exited with code {exit_code}: {diagnostics}")]
    NonZeroExit {
        command: String,
        exit_code: i32,
        diagnostics: String,
    },

    /// IO error while collecting output
    #[error("IO error running {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    /// Diagnostic text captured from the process, if any.
    pub fn diagnostics(&self) -> &str {
        match self {
            ExecError::NonZeroExit { diagnostics, .. } => diagnostics,
            _ => "",
        }
    }
}

/// Result type for gateway operations.
pub type ExecResult<T> = std::result::Result<T, ExecError>;
