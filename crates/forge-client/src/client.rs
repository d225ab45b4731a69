//! HTTP client for a GitHub-compatible forge REST API.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::classify::{classify_fork_failure, classify_pull_response, error_message, PullResponse};
use crate::error::{ForgeError, ForgeResult};
use crate::types::{
    CommitPayload, CommitSummary, ForkInfo, PrSubmission, PullRequestDraft, PullRequestInfo,
    RepoPayload,
};

/// Default public API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";

/// Connection settings for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// API root, e.g. `https://api.github.com` (no trailing slash needed).
    pub api_base_url: String,
    /// Bearer token; anonymous requests when `None`.
    pub token: Option<String>,
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            token: None,
            user_agent: concat!("remedy/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Forge API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    config: ForgeConfig,
}

impl GitHubClient {
    pub fn new(config: ForgeConfig) -> ForgeResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ForgeError::Client(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.config.token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ForgeResult<Response> {
        self.authorized(builder)
            .send()
            .await
            .map_err(ForgeError::transport)
    }

    /// Whether `GET /repos/{owner}/{repo}` answers 200.
    pub async fn repository_exists(&self, owner: &str, repo: &str) -> ForgeResult<bool> {
        let url = self.url(&format!("/repos/{owner}/{repo}"));
        let resp = self.send(self.http.get(&url)).await?;
        let status = resp.status().as_u16();
        debug!(owner, repo, status, "Repository probe");
        Ok(status == 200)
    }

    /// `POST /repos/{owner}/{repo}/forks`.
    ///
    /// Network failures are reported as [`ForgeError::ForkDenied`]; forking
    /// is never retried.
    pub async fn create_fork(&self, owner: &str, repo: &str) -> ForgeResult<ForkInfo> {
        let url = self.url(&format!("/repos/{owner}/{repo}/forks"));
        let resp = self
            .send(self.http.post(&url).json(&serde_json::json!({})))
            .await
            .map_err(|e| ForgeError::ForkDenied {
                status: None,
                message: e.to_string(),
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(ForgeError::transport)?;
        match status {
            200..=202 => {
                let fork: ForkInfo = decode::<RepoPayload>(&body)?.into();
                info!(owner = %fork.owner, name = %fork.name, "Fork ready");
                Ok(fork)
            }
            _ => {
                warn!(owner, repo, status, "Fork request rejected");
                Err(classify_fork_failure(status, &body))
            }
        }
    }

    /// `POST /repos/{owner}/{repo}/pulls` against the upstream repository.
    pub async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        draft: &PullRequestDraft,
    ) -> ForgeResult<PrSubmission> {
        let url = self.url(&format!("/repos/{owner}/{repo}/pulls"));
        info!(head = %draft.head, base = %draft.base, "Creating pull request");

        let resp = self.send(self.http.post(&url).json(draft)).await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(ForgeError::transport)?;

        match classify_pull_response(status, &body) {
            PullResponse::Created => {
                let pr: PullRequestInfo = decode(&body)?;
                info!(number = pr.number, url = %pr.html_url, "Pull request created");
                Ok(PrSubmission::Created(pr))
            }
            PullResponse::AlreadyExists => {
                info!(head = %draft.head, "Pull request already exists");
                Ok(PrSubmission::AlreadyExists {
                    head: draft.head.clone(),
                })
            }
            PullResponse::Rejected(err) => {
                warn!(status, error = %err, "Pull request rejected");
                Err(err)
            }
        }
    }

    /// First open pull request whose head is `<owner>:<branch>`.
    pub async fn find_open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
    ) -> ForgeResult<Option<PullRequestInfo>> {
        let url = self.url(&format!("/repos/{owner}/{repo}/pulls"));
        let resp = self
            .send(self.http.get(&url).query(&[("head", head), ("state", "open")]))
            .await?;
        let list: Vec<PullRequestInfo> = read_success(resp).await?;
        Ok(list.into_iter().next())
    }

    /// Up to `limit` most recent commits on the default branch.
    pub async fn recent_commits(
        &self,
        owner: &str,
        repo: &str,
        limit: usize,
    ) -> ForgeResult<Vec<CommitSummary>> {
        let url = self.url(&format!("/repos/{owner}/{repo}/commits"));
        let per_page = limit.to_string();
        let resp = self
            .send(self.http.get(&url).query(&[("per_page", per_page.as_str())]))
            .await?;
        let entries: Vec<CommitPayload> = read_success(resp).await?;
        Ok(entries.into_iter().take(limit).map(Into::into).collect())
    }
}

async fn read_success<T: DeserializeOwned>(resp: Response) -> ForgeResult<T> {
    let status = resp.status().as_u16();
    let body = resp.text().await.map_err(ForgeError::transport)?;
    match status {
        200..=299 => decode(&body),
        404 => Err(ForgeError::NotFound {
            message: error_message(&body),
        }),
        403 => Err(ForgeError::PermissionDenied {
            message: error_message(&body),
        }),
        status => Err(ForgeError::Unknown {
            status,
            message: error_message(&body),
        }),
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> ForgeResult<T> {
    serde_json::from_str(body).map_err(|e| ForgeError::Decode {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = GitHubClient::new(ForgeConfig {
            api_base_url: "http://127.0.0.1:9/".into(),
            ..ForgeConfig::default()
        })
        .unwrap();
        assert_eq!(client.url("/repos/a/b"), "http://127.0.0.1:9/repos/a/b");
    }

    #[test]
    fn test_default_config_targets_public_api() {
        let config = ForgeConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE);
        assert!(config.user_agent.starts_with("remedy/"));
        assert!(config.token.is_none());
    }
}
