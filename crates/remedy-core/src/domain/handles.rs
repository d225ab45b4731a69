use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fork of the upstream repository owned by the automation identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkHandle {
    pub owner: String,
    pub name: String,
    pub remote_url: String,
}

/// On-disk working copy of the fork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRepoHandle {
    /// Repository identifier shared by the workspace files.
    pub name: String,
    pub path: PathBuf,
    pub default_branch: String,
}
