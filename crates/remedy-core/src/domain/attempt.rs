use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Per-run record of what the patch stage did. Logged, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationAttempt {
    pub branch_name: String,
    pub commit_message: String,
    pub changed: bool,
    pub pushed: bool,
    pub pr_url: Option<String>,
    /// SHA-256 of the replacement content, hex encoded.
    pub content_sha256: String,
}

impl RemediationAttempt {
    pub fn new(branch_name: &str, commit_message: &str, content: &str) -> Self {
        Self {
            branch_name: branch_name.to_string(),
            commit_message: commit_message.to_string(),
            changed: false,
            pushed: false,
            pr_url: None,
            content_sha256: content_digest(content),
        }
    }
}

/// Hex SHA-256 of file content.
pub fn content_digest(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_attempt_is_unchanged() {
        let attempt = RemediationAttempt::new("remedy-patch-1000", "Fix", "abc");
        assert!(!attempt.changed);
        assert!(!attempt.pushed);
        assert!(attempt.pr_url.is_none());
        assert_eq!(
            attempt.content_sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
