//! Request and response payloads for the forge REST API.

use serde::{Deserialize, Serialize};

/// A fork owned by the authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkInfo {
    pub owner: String,
    pub name: String,
    pub clone_url: String,
    pub html_url: String,
}

/// Body of a pull-request creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestDraft {
    pub title: String,
    /// `<fork owner>:<branch>`
    pub head: String,
    pub base: String,
    pub body: String,
    pub maintainer_can_modify: bool,
}

impl PullRequestDraft {
    pub fn new(
        fork_owner: &str,
        head_branch: &str,
        base: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            head: format!("{fork_owner}:{head_branch}"),
            base: base.into(),
            body: body.into(),
            maintainer_can_modify: true,
        }
    }
}

/// An open pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub html_url: String,
}

/// Non-error outcomes of a pull-request creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrSubmission {
    Created(PullRequestInfo),
    /// The forge reported an open PR for the same head already.
    AlreadyExists { head: String },
}

/// One entry of the upstream commit history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub author: String,
    pub date: String,
    pub message: String,
}

// Wire shapes

#[derive(Deserialize)]
pub(crate) struct OwnerPayload {
    pub login: String,
}

#[derive(Deserialize)]
pub(crate) struct RepoPayload {
    pub name: String,
    pub owner: OwnerPayload,
    pub clone_url: String,
    #[serde(default)]
    pub html_url: String,
}

impl From<RepoPayload> for ForkInfo {
    fn from(repo: RepoPayload) -> Self {
        Self {
            owner: repo.owner.login,
            name: repo.name,
            clone_url: repo.clone_url,
            html_url: repo.html_url,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct CommitAuthorPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: String,
}

#[derive(Deserialize)]
pub(crate) struct CommitDetailPayload {
    pub author: Option<CommitAuthorPayload>,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
pub(crate) struct CommitPayload {
    pub sha: String,
    pub commit: CommitDetailPayload,
}

impl From<CommitPayload> for CommitSummary {
    fn from(entry: CommitPayload) -> Self {
        let (author, date) = entry
            .commit
            .author
            .map(|a| (a.name, a.date))
            .unwrap_or_default();
        Self {
            sha: entry.sha,
            author,
            date,
            message: entry.commit.message,
        }
    }
}
