//! Patch commit/push stage.
//!
//! One call of [`PatchStage::apply`] is one remediation attempt on the
//! working copy: fresh branch off the updated default branch, replacement
//! file written and staged, then commit and push only when `git status`
//! reports a change. Every git failure is terminal for the attempt.

use std::path::Path;
use std::sync::Arc;

use remedy_exec::ProcessGateway;
use tracing::{info, warn};

use crate::config::CommitSettings;
use crate::credentials::CredentialProvider;
use crate::domain::error::{RemedyError, Result};
use crate::domain::{LocalRepoHandle, RemediationAttempt};
use crate::git::{authenticated_url, redact_url, Git};
use crate::issues::check_relative;
use crate::ledger::BranchAllocator;

/// Completed step of [`PatchStage::apply_observed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStep {
    Prepared { changed: bool },
    Committed,
    Pushed,
}

pub struct PatchStage {
    gateway: Arc<dyn ProcessGateway>,
    allocator: BranchAllocator,
    credentials: Arc<dyn CredentialProvider>,
    identity: CommitSettings,
    git_timeout_secs: u64,
}

impl PatchStage {
    pub fn new(
        gateway: Arc<dyn ProcessGateway>,
        allocator: BranchAllocator,
        credentials: Arc<dyn CredentialProvider>,
        identity: CommitSettings,
        git_timeout_secs: u64,
    ) -> Self {
        Self {
            gateway,
            allocator,
            credentials,
            identity,
            git_timeout_secs,
        }
    }

    fn git(&self, repo: &LocalRepoHandle) -> Git {
        Git::new(self.gateway.clone(), &repo.path, self.git_timeout_secs)
    }

    /// Allocate a branch, write `content` to `target` and, if the tree
    /// changed, commit and push it.
    pub async fn apply(
        &self,
        repo: &LocalRepoHandle,
        target: &Path,
        content: &str,
        commit_message: &str,
    ) -> Result<RemediationAttempt> {
        self.apply_observed(repo, target, content, commit_message, &mut |_| {})
            .await
    }

    /// [`apply`](Self::apply), reporting each completed step to `observe`.
    pub async fn apply_observed(
        &self,
        repo: &LocalRepoHandle,
        target: &Path,
        content: &str,
        commit_message: &str,
        observe: &mut (dyn FnMut(PatchStep) + Send),
    ) -> Result<RemediationAttempt> {
        check_relative(target)?;
        let git = self.git(repo);
        let origin = git.origin_url().await?;

        let branch = self.allocator.allocate(repo).await?;
        let mut attempt = RemediationAttempt::new(&branch, commit_message, content);

        attempt.changed = self.prepare(repo, &branch, target, content).await?;
        observe(PatchStep::Prepared {
            changed: attempt.changed,
        });
        if !attempt.changed {
            info!(branch = %branch, target = %target.display(), "Replacement matches the working tree; nothing to commit");
            return Ok(attempt);
        }

        self.commit(repo, commit_message).await?;
        observe(PatchStep::Committed);
        self.push(repo, &branch, &origin).await?;
        attempt.pushed = true;
        observe(PatchStep::Pushed);
        Ok(attempt)
    }

    /// Branch off the fast-forwarded default branch, write and stage the
    /// target. Returns whether the working tree now differs from `HEAD`.
    pub async fn prepare(
        &self,
        repo: &LocalRepoHandle,
        branch: &str,
        target: &Path,
        content: &str,
    ) -> Result<bool> {
        check_relative(target)?;
        let git = self.git(repo);

        git.run("checkout", ["checkout", repo.default_branch.as_str()]).await?;
        git.run("pull", ["pull", "--ff-only"]).await?;
        git.run("checkout -b", ["checkout", "-b", branch]).await?;

        let full = repo.path.join(target);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RemedyError::io(parent, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| RemedyError::io(&full, e))?;

        let target_arg = target.to_string_lossy().into_owned();
        git.run("add", ["add", "--", target_arg.as_str()]).await?;
        let status = git.run("status", ["status", "--porcelain"]).await?;
        Ok(!status.stdout.trim().is_empty())
    }

    pub async fn commit(&self, repo: &LocalRepoHandle, message: &str) -> Result<()> {
        let git = self.git(repo);
        let spec = git
            .command(["commit", "-m", message])
            .env("GIT_AUTHOR_NAME", self.identity.author_name.as_str())
            .env("GIT_AUTHOR_EMAIL", self.identity.author_email.as_str())
            .env("GIT_COMMITTER_NAME", self.identity.author_name.as_str())
            .env("GIT_COMMITTER_EMAIL", self.identity.author_email.as_str());
        git.run_spec("commit", &spec).await?;
        info!(repo = %repo.name, "Committed replacement");
        Ok(())
    }

    /// Push `branch` with upstream tracking. For `https` remotes the
    /// credential is embedded for the duration of the push only.
    pub async fn push(&self, repo: &LocalRepoHandle, branch: &str, origin: &str) -> Result<()> {
        let git = self.git(repo);
        let token = self.credentials.forge_token();
        let push_url = authenticated_url(origin, token.as_deref());
        let rewritten = push_url != origin;

        if rewritten {
            let mut spec = git.command(["remote", "set-url", "origin", push_url.as_str()]);
            if let Some(token) = &token {
                spec = spec.secret(token.as_str());
            }
            git.run_spec("remote set-url", &spec).await?;
        }

        let mut spec = git.command(["push", "-u", "origin", branch]);
        if let Some(token) = &token {
            spec = spec.secret(token.as_str());
        }
        let pushed = git.run_spec("push", &spec).await;

        if rewritten {
            let plain = redact_url(origin);
            if let Err(e) = git.run("remote set-url", ["remote", "set-url", "origin", plain.as_str()]).await {
                warn!(error = %e, "Could not restore origin URL");
            }
        }

        pushed?;
        info!(branch = %branch, remote = %redact_url(origin), "Pushed branch");
        Ok(())
    }
}
