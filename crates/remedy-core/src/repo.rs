//! Fork and clone.

use std::path::Path;
use std::sync::Arc;

use remedy_exec::{CommandSpec, ProcessGateway};
use tracing::{info, warn};

use crate::domain::error::{RemedyError, Result};
use crate::domain::{ForkHandle, LocalRepoHandle, RepositoryReference};
use crate::forge::Forge;
use crate::git::{redact_url, Git};
use crate::workspace::Workspace;

/// Obtains the fork and its working copy under the workspace.
#[derive(Clone)]
pub struct RepoManager {
    forge: Arc<dyn Forge>,
    gateway: Arc<dyn ProcessGateway>,
    workspace: Workspace,
    fork_owner: Option<String>,
    clone_timeout_secs: u64,
    git_timeout_secs: u64,
}

impl RepoManager {
    pub fn new(forge: Arc<dyn Forge>, gateway: Arc<dyn ProcessGateway>, workspace: Workspace) -> Self {
        Self {
            forge,
            gateway,
            workspace,
            fork_owner: None,
            clone_timeout_secs: 600,
            git_timeout_secs: 120,
        }
    }

    /// Report forks under this owner instead of the one the forge returns.
    pub fn with_fork_owner(mut self, owner: Option<String>) -> Self {
        self.fork_owner = owner;
        self
    }

    pub fn with_timeouts(mut self, clone_secs: u64, git_secs: u64) -> Self {
        self.clone_timeout_secs = clone_secs;
        self.git_timeout_secs = git_secs;
        self
    }

    /// Fork `upstream`. Every forge failure is terminal `ForkDenied`.
    pub async fn fork(&self, upstream: &RepositoryReference) -> Result<ForkHandle> {
        let info = self
            .forge
            .create_fork(upstream)
            .await
            .map_err(|e| RemedyError::ForkDenied(e.to_string()))?;

        let owner = self.fork_owner.clone().unwrap_or(info.owner);
        info!(upstream = %upstream, fork_owner = %owner, "Fork available");
        Ok(ForkHandle {
            owner,
            name: info.name,
            remote_url: info.clone_url,
        })
    }

    /// Materialize the fork at `repos/<host>/<owner>/<name>` for `upstream`.
    ///
    /// A working copy left by an earlier attempt is reused only when its
    /// `origin` is the fork; it is then forced back onto the default branch.
    /// Anything else at that path is removed and cloned afresh.
    pub async fn clone_fork(
        &self,
        fork: &ForkHandle,
        upstream: &RepositoryReference,
    ) -> Result<LocalRepoHandle> {
        let path = self.workspace.repo_dir(upstream);
        let git = Git::new(self.gateway.clone(), &path, self.git_timeout_secs);

        let reused = path.join(".git").is_dir() && self.is_clone_of(&git, fork).await;
        if !reused {
            if path.exists() {
                warn!(path = %path.display(), "Discarding working copy that is not a clone of the fork");
                tokio::fs::remove_dir_all(&path)
                    .await
                    .map_err(|e| RemedyError::CloneFailed {
                        message: format!("cannot remove stale {}: {e}", path.display()),
                        diagnostics: String::new(),
                    })?;
            }
            self.clone_into(fork, &path).await?;
        }

        let default_branch = match git.remote_default_branch().await {
            Ok(branch) => branch,
            Err(e) => {
                warn!(error = %e, "origin/HEAD unresolved; using checked-out branch");
                git.current_branch().await.map_err(|e| RemedyError::CloneFailed {
                    message: format!("cannot determine default branch: {e}"),
                    diagnostics: e.diagnostics().to_string(),
                })?
            }
        };

        if reused {
            info!(path = %path.display(), branch = %default_branch, "Reusing working copy");
            git.run("checkout", ["checkout", "--force", default_branch.as_str()])
                .await
                .map_err(|e| RemedyError::CloneFailed {
                    message: format!("cannot reset working copy to {default_branch}: {e}"),
                    diagnostics: e.diagnostics().to_string(),
                })?;
        }

        Ok(LocalRepoHandle {
            name: upstream.name.clone(),
            path,
            default_branch,
        })
    }

    async fn is_clone_of(&self, git: &Git, fork: &ForkHandle) -> bool {
        match git.origin_url().await {
            Ok(origin) => redact_url(&origin) == redact_url(&fork.remote_url),
            Err(e) => {
                warn!(error = %e, "Cannot read origin of existing working copy");
                false
            }
        }
    }

    async fn clone_into(&self, fork: &ForkHandle, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.workspace.repos_dir());
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| RemedyError::CloneFailed {
                message: format!("cannot create {}: {e}", parent.display()),
                diagnostics: String::new(),
            })?;

        let spec = CommandSpec::new("git")
            .arg("clone")
            .arg(fork.remote_url.as_str())
            .arg(path.to_string_lossy())
            .current_dir(&parent)
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout_secs(self.clone_timeout_secs);

        info!(remote = %redact_url(&fork.remote_url), path = %path.display(), "Cloning fork");
        self.gateway.run_checked(&spec).await.map_err(|e| {
            warn!(error = %e, "Clone failed");
            RemedyError::CloneFailed {
                message: e.to_string(),
                diagnostics: e.diagnostics().to_string(),
            }
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::fakes::FakeForge;
    use forge_client::ForgeError;
    use remedy_exec::fakes::ScriptedGateway;
    use remedy_exec::CommandOutput;

    fn reference() -> RepositoryReference {
        RepositoryReference::parse("https://github.com/acme/demo.git").unwrap()
    }

    #[tokio::test]
    async fn test_fork_uses_forge_owner_unless_overridden() {
        let dir = tempfile::tempdir().unwrap();
        let forge = Arc::new(FakeForge::builder().build());
        let gateway = Arc::new(ScriptedGateway::new());
        let manager = RepoManager::new(forge, gateway, Workspace::new(dir.path()));

        let fork = manager.fork(&reference()).await.unwrap();
        assert_eq!(fork.owner, "remedy-bot");
        assert_eq!(fork.name, "demo");

        let fork = manager
            .with_fork_owner(Some("other-bot".into()))
            .fork(&reference())
            .await
            .unwrap();
        assert_eq!(fork.owner, "other-bot");
    }

    #[tokio::test]
    async fn test_fork_errors_become_fork_denied() {
        let dir = tempfile::tempdir().unwrap();
        let forge = Arc::new(
            FakeForge::builder()
                .fork_error(ForgeError::TransientNetwork {
                    message: "connection refused".into(),
                })
                .build(),
        );
        let manager = RepoManager::new(forge, Arc::new(ScriptedGateway::new()), Workspace::new(dir.path()));
        let err = manager.fork(&reference()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ForkDenied);
    }

    fn fork_handle() -> ForkHandle {
        ForkHandle {
            owner: "remedy-bot".into(),
            name: "demo".into(),
            remote_url: "https://example.test/remedy-bot/demo.git".into(),
        }
    }

    fn remote_v(url: &str) -> CommandOutput {
        CommandOutput::ok(format!("origin\t{url} (fetch)\norigin\t{url} (push)\n"))
    }

    #[tokio::test]
    async fn test_existing_clone_of_fork_is_reused_on_default_branch() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        std::fs::create_dir_all(workspace.repo_dir(&reference()).join(".git")).unwrap();

        let gateway = Arc::new(
            ScriptedGateway::new()
                .on("git", &["remote", "-v"], remote_v("https://example.test/remedy-bot/demo.git"))
                .on("git", &["symbolic-ref"], CommandOutput::ok("origin/main\n"))
                // Left on a patch branch by an interrupted attempt.
                .on("git", &["rev-parse"], CommandOutput::ok("remedy-patch-0001\n")),
        );
        let manager = RepoManager::new(Arc::new(FakeForge::builder().build()), gateway.clone(), workspace);

        let local = manager.clone_fork(&fork_handle(), &reference()).await.unwrap();
        assert_eq!(local.default_branch, "main");
        assert_eq!(gateway.count("git", &["clone"]), 0);
        assert_eq!(gateway.count("git", &["checkout", "--force", "main"]), 1);
    }

    #[tokio::test]
    async fn test_working_copy_of_another_remote_is_recloned() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let path = workspace.repo_dir(&reference());
        std::fs::create_dir_all(path.join(".git")).unwrap();
        std::fs::write(path.join("stale"), "x").unwrap();

        let gateway = Arc::new(
            ScriptedGateway::new()
                .on("git", &["remote", "-v"], remote_v("https://example.test/someone-else/demo.git"))
                .on("git", &["symbolic-ref"], CommandOutput::ok("origin/main\n")),
        );
        let manager = RepoManager::new(Arc::new(FakeForge::builder().build()), gateway.clone(), workspace);

        let local = manager.clone_fork(&fork_handle(), &reference()).await.unwrap();
        assert_eq!(local.path, path);
        assert_eq!(gateway.count("git", &["clone"]), 1);
        assert!(!path.join("stale").exists());
        assert_eq!(gateway.count("git", &["checkout"]), 0);
    }

    #[tokio::test]
    async fn test_fresh_clone_falls_back_to_checked_out_branch() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(
            ScriptedGateway::new()
                .on(
                    "git",
                    &["symbolic-ref"],
                    CommandOutput::failed(128, "fatal: ref refs/remotes/origin/HEAD is not a symbolic ref"),
                )
                .on("git", &["rev-parse"], CommandOutput::ok("trunk\n")),
        );
        let manager = RepoManager::new(
            Arc::new(FakeForge::builder().build()),
            gateway.clone(),
            Workspace::new(dir.path()),
        );

        let local = manager.clone_fork(&fork_handle(), &reference()).await.unwrap();
        assert_eq!(local.default_branch, "trunk");
        assert_eq!(gateway.count("git", &["clone"]), 1);
    }

    #[tokio::test]
    async fn test_clone_failure_carries_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(ScriptedGateway::new().on(
            "git",
            &["clone"],
            CommandOutput::failed(128, "fatal: repository not found"),
        ));
        let manager = RepoManager::new(
            Arc::new(FakeForge::builder().build()),
            gateway,
            Workspace::new(dir.path()),
        );
        let err = manager.clone_fork(&fork_handle(), &reference()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CloneFailed);
        assert!(err.diagnostics().contains("repository not found"));
    }
}
