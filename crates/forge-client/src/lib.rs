//! Forge Client: the forge-side half of a remediation attempt
//!
//! - repository probe (`GET /repos/{owner}/{repo}`)
//! - fork creation
//! - cross-fork pull-request creation with response classification
//! - open pull-request lookup by head
//! - recent commit listing

pub mod classify;
pub mod client;
pub mod error;
pub mod types;

pub use classify::{classify_pull_response, sanitize_error_body, PullResponse};
pub use client::{ForgeConfig, GitHubClient, DEFAULT_API_BASE};
pub use error::{ForgeError, ForgeResult};
pub use types::{CommitSummary, ForkInfo, PrSubmission, PullRequestDraft, PullRequestInfo};
