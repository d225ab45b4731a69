//! Pipeline configuration.
//!
//! Precedence: defaults, then an optional TOML file, then `REMEDY_*`
//! environment variables, then CLI flags (applied by the binary).
//! Secrets never live here; see [`crate::credentials`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::{RemedyError, Result};
use crate::retry::RetryPolicy;

pub const ENV_FORGE_URL: &str = "REMEDY_FORGE_URL";
pub const ENV_WORKSPACE: &str = "REMEDY_WORKSPACE";
pub const ENV_SUGGEST_URL: &str = "REMEDY_SUGGEST_URL";
pub const ENV_SUGGEST_MODEL: &str = "REMEDY_SUGGEST_MODEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemedyConfig {
    pub forge: ForgeSettings,
    pub workspace_root: PathBuf,
    pub branch_prefix: String,
    pub commit: CommitSettings,
    pub pull_request: PullRequestSettings,
    pub analysis: AnalysisSettings,
    pub timeouts: TimeoutSettings,
    pub retry: RetryPolicy,
    pub limits: LimitSettings,
    pub suggestion: SuggestionSettings,
}

impl Default for RemedyConfig {
    fn default() -> Self {
        Self {
            forge: ForgeSettings::default(),
            workspace_root: PathBuf::from(".remedy"),
            branch_prefix: "remedy-patch".to_string(),
            commit: CommitSettings::default(),
            pull_request: PullRequestSettings::default(),
            analysis: AnalysisSettings::default(),
            timeouts: TimeoutSettings::default(),
            retry: RetryPolicy::default(),
            limits: LimitSettings::default(),
            suggestion: SuggestionSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeSettings {
    pub api_base_url: String,
    /// Overrides the fork owner reported by the forge.
    pub fork_owner: Option<String>,
    pub user_agent: String,
}

impl Default for ForgeSettings {
    fn default() -> Self {
        Self {
            api_base_url: forge_client::DEFAULT_API_BASE.to_string(),
            fork_owner: None,
            user_agent: concat!("remedy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitSettings {
    pub message: String,
    pub author_name: String,
    pub author_email: String,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            message: "Fix static analysis findings".to_string(),
            author_name: "Remedy Bot".to_string(),
            author_email: "remedy-bot@users.noreply.github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestSettings {
    pub title: String,
    pub body: String,
}

impl Default for PullRequestSettings {
    fn default() -> Self {
        Self {
            title: "Static analysis problems resolved".to_string(),
            body: "Automated code quality improvements for issues reported by static analysis."
                .to_string(),
        }
    }
}

/// External analysis tool. `{repo}`, `{repo_path}` and `{report}` in `args`
/// are substituted per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            program: "checkstyle".to_string(),
            args: ["-c", "/google_checks.xml", "-f", "xml", "-o", "{report}", "{repo_path}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Timeouts in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub http_secs: u64,
    pub git_secs: u64,
    pub clone_secs: u64,
    pub analysis_secs: u64,
    pub suggestion_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            http_secs: 15,
            git_secs: 120,
            clone_secs: 600,
            analysis_secs: 900,
            suggestion_secs: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Issues of the selected file sent to the suggestion service.
    pub issue_limit: usize,
    /// Files longer than this are not sent for suggestion.
    pub max_file_lines: usize,
    /// Upstream commits kept in the history snapshot.
    pub commit_history: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            issue_limit: 5,
            max_file_lines: 300,
            commit_history: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionSettings {
    /// Chat-completions endpoint.
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
        }
    }
}

impl RemedyConfig {
    /// Defaults, overlaid by `path` when given, overlaid by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| RemedyError::io(path, e))?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| RemedyError::Config(e.to_string()))
    }

    /// Apply `REMEDY_*` overrides read through `lookup`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_FORGE_URL) {
            self.forge.api_base_url = v;
        }
        if let Some(v) = get(ENV_WORKSPACE) {
            self.workspace_root = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_SUGGEST_URL) {
            self.suggestion.endpoint = v;
        }
        if let Some(v) = get(ENV_SUGGEST_MODEL) {
            self.suggestion.model = v;
        }
    }
}
