//! Interpretation of forge responses.
//!
//! Kept free of I/O so status/body pairs can be tested directly.

use serde::Deserialize;

use crate::error::ForgeError;

/// Maximum length for error body content in error messages
const MAX_ERROR_BODY_LEN: usize = 200;

const ALREADY_EXISTS: &str = "pull request already exists";

#[derive(Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Classified outcome of a pull-request creation response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullResponse {
    Created,
    AlreadyExists,
    Rejected(ForgeError),
}

/// Map a pull-request creation status and body onto an outcome.
///
/// The "already exists" detection is a case-insensitive substring match on
/// the forge's error messages; callers confirm it with a lookup.
pub fn classify_pull_response(status: u16, body: &str) -> PullResponse {
    match status {
        200 | 201 => PullResponse::Created,
        422 => {
            let lowered = body.to_lowercase();
            if api_messages(body)
                .iter()
                .any(|m| m.to_lowercase().contains(ALREADY_EXISTS))
                || lowered.contains(ALREADY_EXISTS)
            {
                PullResponse::AlreadyExists
            } else {
                PullResponse::Rejected(ForgeError::Validation {
                    message: error_message(body),
                })
            }
        }
        404 => PullResponse::Rejected(ForgeError::NotFound {
            message: error_message(body),
        }),
        403 => PullResponse::Rejected(ForgeError::PermissionDenied {
            message: error_message(body),
        }),
        status => PullResponse::Rejected(ForgeError::Unknown {
            status,
            message: error_message(body),
        }),
    }
}

/// Map a fork creation failure status onto an error.
pub fn classify_fork_failure(status: u16, body: &str) -> ForgeError {
    match status {
        401 | 403 | 404 | 451 => ForgeError::ForkDenied {
            status: Some(status),
            message: error_message(body),
        },
        status => ForgeError::Unknown {
            status,
            message: error_message(body),
        },
    }
}

fn api_messages(body: &str) -> Vec<String> {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api) => std::iter::once(api.message)
            .chain(api.errors.into_iter().filter_map(|e| e.message))
            .filter(|m| !m.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Human-readable message from an error body: the structured message and
/// first detail when the body parses, otherwise the sanitized raw text.
pub fn error_message(body: &str) -> String {
    if let Ok(api) = serde_json::from_str::<ApiErrorResponse>(body) {
        let detail = api
            .errors
            .first()
            .and_then(|e| e.message.clone())
            .unwrap_or_default();
        let message = if detail.is_empty() {
            api.message
        } else if api.message.is_empty() {
            detail
        } else {
            format!("{}: {}", api.message, detail)
        };
        if !message.is_empty() {
            return sanitize_error_body(&message);
        }
    }
    sanitize_error_body(body)
}

/// Sanitize an API error body to prevent credential leakage.
/// Truncates long responses and redacts potential secrets.
pub fn sanitize_error_body(body: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "token",
        "secret",
        "password",
        "credential",
        "bearer",
        "ghp_",
        "gho_",
        "ghu_",
        "github_pat_",
    ];

    let trimmed = body.trim();
    let truncated = if trimmed.len() > MAX_ERROR_BODY_LEN {
        let mut end = MAX_ERROR_BODY_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &trimmed[..end])
    } else {
        trimmed.to_string()
    };

    let lower = truncated.to_lowercase();
    if SECRET_PATTERNS.iter().any(|p| lower.contains(p)) {
        return "(error details redacted - may contain sensitive data)".to_string();
    }
    truncated
}
