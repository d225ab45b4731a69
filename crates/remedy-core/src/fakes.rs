//! In-memory collaborators for tests
//!
//! `FakeForge` answers forge calls from canned data and records what the
//! pipeline sent. `FakeSuggestion` wraps a closure.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use forge_client::{
    CommitSummary, ForgeError, ForgeResult, ForkInfo, PrSubmission, PullRequestDraft,
    PullRequestInfo,
};

use crate::domain::error::Result;
use crate::domain::RepositoryReference;
use crate::forge::Forge;
use crate::suggest::{SuggestionRequest, SuggestionService};

#[derive(Default)]
pub struct FakeForgeBuilder {
    probe: Option<ForgeResult<bool>>,
    fork: Option<ForgeResult<ForkInfo>>,
    pull_results: VecDeque<ForgeResult<PrSubmission>>,
    open_pr: Option<PullRequestInfo>,
    commits: Option<ForgeResult<Vec<CommitSummary>>>,
}

impl FakeForgeBuilder {
    pub fn repository_exists(mut self, exists: bool) -> Self {
        self.probe = Some(Ok(exists));
        self
    }

    pub fn repository_probe_error(mut self, err: ForgeError) -> Self {
        self.probe = Some(Err(err));
        self
    }

    pub fn fork(mut self, fork: ForkInfo) -> Self {
        self.fork = Some(Ok(fork));
        self
    }

    pub fn fork_error(mut self, err: ForgeError) -> Self {
        self.fork = Some(Err(err));
        self
    }

    /// Queue a result for the next pull-request creation call. Once the
    /// queue is empty, calls succeed with PR #1.
    pub fn pull_request_result(mut self, result: ForgeResult<PrSubmission>) -> Self {
        self.pull_results.push_back(result);
        self
    }

    pub fn open_pull_request(mut self, pr: PullRequestInfo) -> Self {
        self.open_pr = Some(pr);
        self
    }

    pub fn commits(mut self, commits: Vec<CommitSummary>) -> Self {
        self.commits = Some(Ok(commits));
        self
    }

    pub fn commits_error(mut self, err: ForgeError) -> Self {
        self.commits = Some(Err(err));
        self
    }

    pub fn build(self) -> FakeForge {
        FakeForge {
            probe: self.probe.unwrap_or(Ok(true)),
            fork: self.fork,
            pull_results: Mutex::new(self.pull_results),
            open_pr: self.open_pr,
            commits: self.commits.unwrap_or_else(|| Ok(Vec::new())),
            forks: Mutex::new(0),
            drafts: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
        }
    }
}

pub struct FakeForge {
    probe: ForgeResult<bool>,
    fork: Option<ForgeResult<ForkInfo>>,
    pull_results: Mutex<VecDeque<ForgeResult<PrSubmission>>>,
    open_pr: Option<PullRequestInfo>,
    commits: ForgeResult<Vec<CommitSummary>>,
    forks: Mutex<usize>,
    drafts: Mutex<Vec<PullRequestDraft>>,
    lookups: Mutex<Vec<String>>,
}

impl FakeForge {
    pub fn builder() -> FakeForgeBuilder {
        FakeForgeBuilder::default()
    }

    pub fn fork_calls(&self) -> usize {
        *self.forks.lock().unwrap()
    }

    /// Every pull-request draft submitted, including retried ones.
    pub fn pull_requests(&self) -> Vec<PullRequestDraft> {
        self.drafts.lock().unwrap().clone()
    }

    /// Heads passed to the open-PR lookup.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl Forge for FakeForge {
    async fn repository_exists(&self, _upstream: &RepositoryReference) -> ForgeResult<bool> {
        self.probe.clone()
    }

    async fn create_fork(&self, upstream: &RepositoryReference) -> ForgeResult<ForkInfo> {
        *self.forks.lock().unwrap() += 1;
        match &self.fork {
            Some(result) => result.clone(),
            None => Ok(ForkInfo {
                owner: "remedy-bot".to_string(),
                name: upstream.name.clone(),
                clone_url: format!("https://example.test/remedy-bot/{}.git", upstream.name),
                html_url: format!("https://example.test/remedy-bot/{}", upstream.name),
            }),
        }
    }

    async fn create_pull_request(
        &self,
        upstream: &RepositoryReference,
        draft: &PullRequestDraft,
    ) -> ForgeResult<PrSubmission> {
        self.drafts.lock().unwrap().push(draft.clone());
        match self.pull_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(PrSubmission::Created(PullRequestInfo {
                number: 1,
                html_url: format!("{}/pull/1", upstream.web_url()),
            })),
        }
    }

    async fn find_open_pull_request(
        &self,
        _upstream: &RepositoryReference,
        head: &str,
    ) -> ForgeResult<Option<PullRequestInfo>> {
        self.lookups.lock().unwrap().push(head.to_string());
        Ok(self.open_pr.clone())
    }

    async fn recent_commits(
        &self,
        _upstream: &RepositoryReference,
        limit: usize,
    ) -> ForgeResult<Vec<CommitSummary>> {
        self.commits
            .clone()
            .map(|commits| commits.into_iter().take(limit).collect())
    }
}

type SuggestFn = dyn Fn(&SuggestionRequest) -> Result<String> + Send + Sync;

/// Suggestion service backed by a closure; records each request.
pub struct FakeSuggestion {
    respond: Arc<SuggestFn>,
    requests: Mutex<Vec<SuggestionRequest>>,
}

impl FakeSuggestion {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&SuggestionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            respond: Arc::new(respond),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the file content unchanged.
    pub fn echo() -> Self {
        Self::new(|req| Ok(req.content.clone()))
    }

    pub fn requests(&self) -> Vec<SuggestionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuggestionService for FakeSuggestion {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }
}
