//! Upstream commit history snapshot.

use std::path::Path;

use tracing::{debug, warn};

use crate::domain::RepositoryReference;
use crate::forge::Forge;

/// Write up to `limit` recent upstream commits to `path` as pretty JSON.
///
/// Best effort: failures are logged and reported as `false`.
pub async fn snapshot_commits(
    forge: &dyn Forge,
    upstream: &RepositoryReference,
    limit: usize,
    path: &Path,
) -> bool {
    let commits = match forge.recent_commits(upstream, limit).await {
        Ok(commits) => commits,
        Err(err) => {
            warn!(repository = %upstream, error = %err, "Commit history unavailable");
            return false;
        }
    };

    match write_snapshot(&commits, path).await {
        Ok(()) => {
            debug!(path = %path.display(), commits = commits.len(), "Saved commit history");
            true
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Could not save commit history");
            false
        }
    }
}

async fn write_snapshot<T: serde::Serialize>(commits: &T, path: &Path) -> Result<(), String> {
    let json = serde_json::to_string_pretty(commits).map_err(|e| e.to_string())?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }
    tokio::fs::write(path, json).await.map_err(|e| e.to_string())
}
