//! On-disk layout under the workspace root.
//!
//! Every per-repository path is keyed by `<host>/<owner>/<name>` so two
//! upstreams sharing a name never share state.
//!
//! ```text
//! <root>/
//!   repos/<host>/<owner>/<name>/              working copy (removed by cleanup)
//!   repos/<host>/<owner>/<name>.lock          held for a whole attempt
//!   repos/<host>/<owner>/<name>.branches      branch ledger (kept)
//!   repos/<host>/<owner>/<name>.branches.lock
//!   analysis/<host>/<owner>/<name>.xml        markup report
//!   analysis/<host>/<owner>/<name>.json       normalized tree
//!   commits/<host>/<owner>/<name>.json        upstream commit snapshot (kept)
//! ```

use std::fs::{File, OpenOptions};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use markup_tree::ReportPaths;
use tracing::info;

use crate::domain::error::{RemedyError, Result};
use crate::domain::RepositoryReference;

const LOCK_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.root.join("repos")
    }

    pub fn repo_dir(&self, repo: &RepositoryReference) -> PathBuf {
        self.repos_dir().join(repo.workspace_key())
    }

    pub fn analysis_dir(&self) -> PathBuf {
        self.root.join("analysis")
    }

    pub fn report_paths(&self, repo: &RepositoryReference) -> ReportPaths {
        let dir = self.analysis_dir().join(&repo.host).join(&repo.owner);
        ReportPaths::new(&dir, &repo.name)
    }

    pub fn commits_path(&self, repo: &RepositoryReference) -> PathBuf {
        self.root
            .join("commits")
            .join(&repo.host)
            .join(&repo.owner)
            .join(format!("{}.json", repo.name))
    }

    pub fn attempt_lock_path(&self, repo: &RepositoryReference) -> PathBuf {
        self.repo_dir(repo)
            .with_file_name(format!("{}.lock", repo.name))
    }

    /// Create the directory skeleton.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            self.repos_dir(),
            self.analysis_dir(),
            self.root.join("commits"),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| RemedyError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Paths released at the end of an attempt on `repo`.
    pub fn disposable_paths(&self, repo: &RepositoryReference) -> Vec<PathBuf> {
        let reports = self.report_paths(repo);
        vec![self.repo_dir(repo), reports.markup, reports.normalized]
    }

    /// Claim `repo`'s working copy, waiting while another attempt holds it.
    pub async fn lock_working_copy(&self, repo: &RepositoryReference) -> Result<WorkingCopyLock> {
        WorkingCopyLock::acquire(&self.attempt_lock_path(repo)).await
    }
}

/// Exclusive claim on one working copy for the length of an attempt.
/// Released on drop.
#[derive(Debug)]
pub struct WorkingCopyLock {
    file: File,
    path: PathBuf,
}

impl WorkingCopyLock {
    /// Poll until the lock at `path` is free. Cancellation drops the future
    /// and with it the unlocked file handle.
    pub async fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RemedyError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| RemedyError::io(path, e))?;

        let mut announced = false;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    })
                }
                Err(err) if err.kind() == IoErrorKind::WouldBlock || is_contended(&err) => {
                    if !announced {
                        info!(path = %path.display(), "Working copy in use; waiting");
                        announced = true;
                    }
                    tokio::time::sleep(LOCK_POLL).await;
                }
                Err(err) => {
                    return Err(RemedyError::Lock {
                        path: path.to_path_buf(),
                        reason: err.to_string(),
                    })
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for WorkingCopyLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
