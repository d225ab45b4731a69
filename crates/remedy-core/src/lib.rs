//! Remedy core library
//!
//! Forks a repository, runs a static-analysis tool on a working copy of the
//! fork, asks a suggestion service for a fixed version of the first reported
//! file, pushes the change to a fresh branch and opens a pull request
//! upstream. Entry point: [`Pipeline`].

pub mod analysis;
pub mod cancel;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod fakes;
pub mod forge;
pub mod git;
pub mod history;
pub mod issues;
pub mod ledger;
pub mod obs;
pub mod patch;
pub mod pipeline;
pub mod repo;
pub mod retry;
pub mod submit;
pub mod suggest;
pub mod telemetry;
pub mod validate;
pub mod workspace;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use config::RemedyConfig;
pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
pub use domain::{
    ErrorKind, FileIssues, ForkHandle, IssueRecord, IssueWindow, LocalRepoHandle,
    RemediationAttempt, RemedyError, RepositoryReference, Result, Severity, Stage, StageFailure,
};
pub use forge::Forge;
pub use ledger::BranchAllocator;
pub use patch::PatchStage;
pub use pipeline::{AttemptOutcome, AttemptReport, Pipeline, PipelineBuilder, PipelineState, StageEvent};
pub use submit::{PrOutcome, PrSubmitter};
pub use suggest::{ChatCompletionsService, SuggestionRequest, SuggestionService};
pub use telemetry::init_tracing;
pub use validate::{ForgeValidator, StaticValidator, UrlValidator};
pub use workspace::{WorkingCopyLock, Workspace};
