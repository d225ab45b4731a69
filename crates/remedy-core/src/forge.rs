//! Forge seam used by the pipeline.

use async_trait::async_trait;
use forge_client::{
    CommitSummary, ForgeResult, ForkInfo, GitHubClient, PrSubmission, PullRequestDraft,
    PullRequestInfo,
};

use crate::domain::RepositoryReference;

/// Forge operations the pipeline needs, addressed by upstream reference.
#[async_trait]
pub trait Forge: Send + Sync {
    async fn repository_exists(&self, upstream: &RepositoryReference) -> ForgeResult<bool>;

    async fn create_fork(&self, upstream: &RepositoryReference) -> ForgeResult<ForkInfo>;

    async fn create_pull_request(
        &self,
        upstream: &RepositoryReference,
        draft: &PullRequestDraft,
    ) -> ForgeResult<PrSubmission>;

    async fn find_open_pull_request(
        &self,
        upstream: &RepositoryReference,
        head: &str,
    ) -> ForgeResult<Option<PullRequestInfo>>;

    async fn recent_commits(
        &self,
        upstream: &RepositoryReference,
        limit: usize,
    ) -> ForgeResult<Vec<CommitSummary>>;
}

#[async_trait]
impl Forge for GitHubClient {
    async fn repository_exists(&self, upstream: &RepositoryReference) -> ForgeResult<bool> {
        GitHubClient::repository_exists(self, &upstream.owner, &upstream.name).await
    }

    async fn create_fork(&self, upstream: &RepositoryReference) -> ForgeResult<ForkInfo> {
        GitHubClient::create_fork(self, &upstream.owner, &upstream.name).await
    }

    async fn create_pull_request(
        &self,
        upstream: &RepositoryReference,
        draft: &PullRequestDraft,
    ) -> ForgeResult<PrSubmission> {
        GitHubClient::create_pull_request(self, &upstream.owner, &upstream.name, draft).await
    }

    async fn find_open_pull_request(
        &self,
        upstream: &RepositoryReference,
        head: &str,
    ) -> ForgeResult<Option<PullRequestInfo>> {
        GitHubClient::find_open_pull_request(self, &upstream.owner, &upstream.name, head).await
    }

    async fn recent_commits(
        &self,
        upstream: &RepositoryReference,
        limit: usize,
    ) -> ForgeResult<Vec<CommitSummary>> {
        GitHubClient::recent_commits(self, &upstream.owner, &upstream.name, limit).await
    }
}
