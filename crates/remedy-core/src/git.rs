//! Git invocations through the process gateway.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use remedy_exec::{CommandOutput, CommandSpec, ProcessGateway};
use tracing::debug;
use url::Url;

use crate::domain::error::{RemedyError, Result};

/// Git bound to one working copy.
#[derive(Clone)]
pub struct Git {
    gateway: Arc<dyn ProcessGateway>,
    repo_dir: PathBuf,
    timeout_secs: u64,
}

impl Git {
    pub fn new(gateway: Arc<dyn ProcessGateway>, repo_dir: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            gateway,
            repo_dir: repo_dir.into(),
            timeout_secs,
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Base command: `git <args>` in the working copy, never prompting.
    pub fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout_secs(self.timeout_secs)
    }

    /// Run a prepared command; non-zero exit becomes `GitOperation` tagged with `step`.
    pub async fn run_spec(&self, step: &str, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(step, command = %spec.display_line(), "git");
        self.gateway
            .run_checked(spec)
            .await
            .map_err(|e| RemedyError::git(step, e))
    }

    pub async fn run<I, S>(&self, step: &str, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = self.command(args);
        self.run_spec(step, &spec).await
    }

    /// Name of the checked-out branch.
    pub async fn current_branch(&self) -> Result<String> {
        let out = self
            .run("rev-parse", ["rev-parse", "--abbrev-ref", "HEAD"])
            .await?;
        let branch = out.stdout.trim().to_string();
        if branch.is_empty() || branch == "HEAD" {
            return Err(RemedyError::GitOperation {
                step: "rev-parse".to_string(),
                message: "working copy has no checked-out branch".to_string(),
                diagnostics: out.diagnostics(),
            });
        }
        Ok(branch)
    }

    /// Branch `refs/remotes/origin/HEAD` points at, without the `origin/` prefix.
    pub async fn remote_default_branch(&self) -> Result<String> {
        let out = self
            .run(
                "symbolic-ref",
                ["symbolic-ref", "--short", "refs/remotes/origin/HEAD"],
            )
            .await?;
        let full = out.stdout.trim();
        let branch = full.strip_prefix("origin/").unwrap_or(full);
        if branch.is_empty() {
            return Err(RemedyError::GitOperation {
                step: "symbolic-ref".to_string(),
                message: "origin has no default branch".to_string(),
                diagnostics: out.diagnostics(),
            });
        }
        Ok(branch.to_string())
    }

    /// Fetch URL of `origin` from `git remote -v` output.
    pub async fn origin_url(&self) -> Result<String> {
        let out = self.run("remote", ["remote", "-v"]).await?;
        parse_origin_url(&out.stdout).ok_or_else(|| RemedyError::GitOperation {
            step: "remote".to_string(),
            message: "no origin remote configured".to_string(),
            diagnostics: out.diagnostics(),
        })
    }
}

/// First `origin … (fetch)` URL in `git remote -v` output.
pub fn parse_origin_url(remote_v: &str) -> Option<String> {
    remote_v.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("origin"), Some(url), Some("(fetch)")) | (Some("origin"), Some(url), None) => {
                Some(url.to_string())
            }
            _ => None,
        }
    })
}

/// Push URL with the token embedded for `https` remotes; other remotes unchanged.
pub fn authenticated_url(remote: &str, token: Option<&str>) -> String {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return remote.to_string();
    };
    match Url::parse(remote) {
        Ok(mut url) if url.scheme() == "https" => {
            if url.set_username("x-access-token").is_err() || url.set_password(Some(token)).is_err() {
                return remote.to_string();
            }
            url.to_string()
        }
        _ => remote.to_string(),
    }
}

/// Remote URL with any embedded credentials removed.
pub fn redact_url(remote: &str) -> String {
    match Url::parse(remote) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        _ => remote.to_string(),
    }
}
