//! Domain models for Remedy.
//!
//! - `RepositoryReference`: upstream repository parsed from a URL
//! - `ForkHandle` / `LocalRepoHandle`: the fork and its working copy
//! - `IssueRecord`: one analysis finding
//! - `RemediationAttempt`: outcome of the patch stage
//! - `RemedyError` / `ErrorKind` / `StageFailure`: failure taxonomy

pub mod attempt;
pub mod error;
pub mod handles;
pub mod issue;
pub mod reference;
pub mod stage;

pub use attempt::{content_digest, RemediationAttempt};
pub use error::{ErrorKind, RemedyError, Result, StageFailure};
pub use handles::{ForkHandle, LocalRepoHandle};
pub use issue::{FileIssues, IssueRecord, IssueWindow, Severity};
pub use reference::RepositoryReference;
pub use stage::Stage;
