//! Error types for forge-client

use thiserror::Error;

/// Errors returned by forge API calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForgeError {
    /// 422 that is not an "already exists" conflict
    #[error("forge validation failed: {message}")]
    Validation { message: String },

    /// 404: repository or branch missing on the remote
    #[error("not found on forge: {message}")]
    NotFound { message: String },

    /// 403: the identity lacks permission
    #[error("permission denied by forge: {message}")]
    PermissionDenied { message: String },

    /// Any other non-2xx status
    #[error("forge error ({status}): {message}")]
    Unknown { status: u16, message: String },

    /// Timeout or connection failure; no defined state on the server
    #[error("transient network error: {message}")]
    TransientNetwork { message: String },

    /// Fork refused or impossible (private, inaccessible, no permission)
    #[error("fork denied: {message}")]
    ForkDenied { status: Option<u16>, message: String },

    /// Response body did not have the expected shape
    #[error("unexpected forge response: {message}")]
    Decode { message: String },

    /// HTTP client could not be constructed
    #[error("http client error: {0}")]
    Client(String),
}

impl ForgeError {
    /// Only network-level failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, ForgeError::TransientNetwork { .. })
    }

    pub(crate) fn transport(err: reqwest::Error) -> Self {
        ForgeError::TransientNetwork {
            message: err.without_url().to_string(),
        }
    }
}

/// Result type for forge operations.
pub type ForgeResult<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(ForgeError::TransientNetwork {
            message: "timed out".into()
        }
        .is_transient());
        assert!(!ForgeError::Validation {
            message: "bad base".into()
        }
        .is_transient());
        assert!(!ForgeError::Unknown {
            status: 502,
            message: String::new()
        }
        .is_transient());
    }

    #[test]
    fn test_fork_denied_display() {
        let err = ForgeError::ForkDenied {
            status: Some(403),
            message: "Resource not accessible".into(),
        };
        assert_eq!(err.to_string(), "fork denied: Resource not accessible");
    }
}
