//! Pull request submission.

use std::sync::Arc;

use forge_client::{ForgeError, PrSubmission, PullRequestDraft};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::error::Result;
use crate::domain::{ForkHandle, RepositoryReference};
use crate::forge::Forge;
use crate::retry::RetryPolicy;

/// Non-error results of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrOutcome {
    Created { url: String, number: u64 },
    /// An open PR for the same head already existed; `url` is set when the
    /// follow-up lookup found it.
    AlreadyExists { url: Option<String> },
}

impl PrOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            PrOutcome::Created { url, .. } => Some(url),
            PrOutcome::AlreadyExists { url } => url.as_deref(),
        }
    }
}

pub struct PrSubmitter {
    forge: Arc<dyn Forge>,
    retry: RetryPolicy,
}

impl PrSubmitter {
    pub fn new(forge: Arc<dyn Forge>, retry: RetryPolicy) -> Self {
        Self { forge, retry }
    }

    /// Open `<fork owner>:<head_branch>` against `base` on `upstream`.
    ///
    /// Only transient network failures are retried.
    pub async fn submit(
        &self,
        fork: &ForkHandle,
        upstream: &RepositoryReference,
        head_branch: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PrOutcome> {
        let draft = PullRequestDraft::new(&fork.owner, head_branch, base, title, body);
        let forge = self.forge.as_ref();

        let submission = self
            .retry
            .run("create_pull_request", ForgeError::is_transient, || {
                forge.create_pull_request(upstream, &draft)
            })
            .await?;

        match submission {
            PrSubmission::Created(pr) => Ok(PrOutcome::Created {
                url: pr.html_url,
                number: pr.number,
            }),
            PrSubmission::AlreadyExists { head } => {
                let url = match forge.find_open_pull_request(upstream, &head).await {
                    Ok(found) => found.map(|pr| pr.html_url),
                    Err(err) => {
                        warn!(head = %head, error = %err, "Lookup of existing pull request failed");
                        None
                    }
                };
                info!(head = %head, url = url.as_deref().unwrap_or("unknown"), "Reusing open pull request");
                Ok(PrOutcome::AlreadyExists { url })
            }
        }
    }
}
