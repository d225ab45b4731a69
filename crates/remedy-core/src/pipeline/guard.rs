//! Scoped release of per-attempt local state.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::obs;

/// Paths an attempt created. [`ResourceGuard::release`] removes them; if
/// the guard is dropped unreleased (a panic or an abandoned future), `Drop`
/// removes them instead.
#[derive(Debug, Default)]
pub struct ResourceGuard {
    paths: Vec<PathBuf>,
    released: bool,
}

impl ResourceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove every tracked path. Failures are logged and counted, never
    /// returned as errors.
    pub fn release(&mut self) -> usize {
        self.released = true;
        let mut failures = 0;
        for path in self.paths.drain(..) {
            if let Err(err) = remove_path(&path) {
                obs::emit_cleanup_failed(&path, &err);
                failures += 1;
            } else {
                debug!(path = %path.display(), "Released");
            }
        }
        failures
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(err) => Err(err),
    };
    match result {
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_removes_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repos/demo");
        std::fs::create_dir_all(repo.join("src")).unwrap();
        std::fs::write(repo.join("src/App.java"), "x").unwrap();
        let report = dir.path().join("demo.xml");
        std::fs::write(&report, "<checkstyle/>").unwrap();

        let mut guard = ResourceGuard::new();
        guard.track(&repo);
        guard.track(&report);
        guard.track(dir.path().join("never-created"));

        assert_eq!(guard.release(), 0);
        assert!(!repo.exists());
        assert!(!report.exists());
    }

    #[test]
    fn test_drop_releases_when_not_released() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repos/demo");
        std::fs::create_dir_all(&repo).unwrap();
        {
            let mut guard = ResourceGuard::new();
            guard.track(&repo);
        }
        assert!(!repo.exists());
    }

    #[test]
    fn test_drop_after_release_keeps_new_state() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repos/demo");
        let mut guard = ResourceGuard::new();
        guard.track(&repo);
        guard.release();
        std::fs::create_dir_all(&repo).unwrap();
        drop(guard);
        assert!(repo.exists());
    }
}
