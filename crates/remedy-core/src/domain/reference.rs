//! Repository references parsed from user-supplied URLs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{RemedyError, Result};

/// `{host, owner, name}` of an upstream repository.
///
/// Accepted forms:
/// - `https://host/owner/name[.git][/]` (also `http://`)
/// - `git@host:owner/name[.git]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl RepositoryReference {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(invalid(input, "empty reference"));
        }

        if let Some(rest) = input.strip_prefix("git@") {
            let (host, path) = rest
                .split_once(':')
                .ok_or_else(|| invalid(input, "expected git@host:owner/name"))?;
            return Self::from_parts(input, host, path);
        }

        let url = Url::parse(input).map_err(|e| invalid(input, &e.to_string()))?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(invalid(input, "unsupported scheme"));
        }
        let host = url
            .host_str()
            .ok_or_else(|| invalid(input, "missing host"))?;
        Self::from_parts(input, host, url.path())
    }

    fn from_parts(input: &str, host: &str, path: &str) -> Result<Self> {
        if host.is_empty() {
            return Err(invalid(input, "missing host"));
        }
        let segments: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let [owner, name] = segments.as_slice() else {
            return Err(invalid(input, "expected exactly owner/name"));
        };
        let owner = *owner;
        let name = name.strip_suffix(".git").unwrap_or(*name);
        if !is_path_safe(host, |c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
            return Err(invalid(input, "invalid host"));
        }
        for part in [owner, name] {
            if !is_path_safe(part, |c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')) {
                return Err(invalid(input, "owner and name may only contain letters, digits, '.', '-' and '_'"));
            }
        }
        Ok(Self {
            host: host.to_ascii_lowercase(),
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Relative path `<host>/<owner>/<name>` identifying this repository
    /// under the workspace directories.
    pub fn workspace_key(&self) -> PathBuf {
        PathBuf::from(&self.host).join(&self.owner).join(&self.name)
    }

    /// `owner/name`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn web_url(&self) -> String {
        format!("https://{}/{}/{}", self.host, self.owner, self.name)
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.owner, self.name)
    }
}

/// Non-empty, not `.` or `..`, and every character accepted by `allowed`.
/// Components passing this check are safe to join onto a directory.
fn is_path_safe(part: &str, allowed: impl Fn(char) -> bool) -> bool {
    !part.is_empty() && part != "." && part != ".." && part.chars().all(allowed)
}

fn invalid(input: &str, reason: &str) -> RemedyError {
    RemedyError::InvalidReference(format!("{input:?}: {reason}"))
}
