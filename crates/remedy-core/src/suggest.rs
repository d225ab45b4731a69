//! Replacement-content suggestions from a chat-completions service.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use forge_client::sanitize_error_body;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SuggestionSettings;
use crate::domain::error::{RemedyError, Result};
use crate::domain::{IssueRecord, IssueWindow};

/// Everything the service sees for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionRequest {
    /// Path relative to the working copy root.
    pub path: String,
    pub content: String,
    pub issues: Vec<IssueRecord>,
    pub windows: Vec<IssueWindow>,
}

/// Text in, replacement file content out.
#[async_trait]
pub trait SuggestionService: Send + Sync {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<String>;

    /// Cheap reachability check.
    async fn probe(&self) -> Result<()>;
}

const SYSTEM_PROMPT: &str = "You are a helpful coding assistant.";

pub fn build_prompt(request: &SuggestionRequest) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are a code-fixing assistant. Fix ONLY the {} issues listed below, nothing else.",
        request.issues.len()
    );
    let _ = writeln!(prompt, "\nFile: {}\n\nIssues:", request.path);
    for issue in &request.issues {
        let _ = writeln!(
            prompt,
            "- line {}, column {} [{:?}] {} ({})",
            issue.line, issue.column, issue.severity, issue.message, issue.source
        );
    }
    if !request.windows.is_empty() {
        let ranges: Vec<String> = request
            .windows
            .iter()
            .map(|w| format!("{}-{}", w.start, w.end))
            .collect();
        let _ = writeln!(prompt, "\nFocus on lines: {}", ranges.join(", "));
    }
    let _ = writeln!(prompt, "\nOriginal code:\n{}", request.content);
    prompt.push_str("\nReturn the complete corrected file only, without explanations.");
    prompt
}

/// Drop a surrounding markdown code fence, including its language tag.
/// Only the fence lines are removed; text without a fence is returned as is.
pub fn strip_code_fence(text: &str) -> String {
    let Some(rest) = text.trim_start().strip_prefix("```") else {
        return text.to_string();
    };
    let Some((_, body)) = rest.split_once('\n') else {
        return text.to_string();
    };
    let Some(body) = body.trim_end().strip_suffix("```") else {
        return body.to_string();
    };
    let body = body.strip_suffix('\n').unwrap_or(body);
    body.strip_suffix('\r').unwrap_or(body).to_string()
}

/// Keep the original file's trailing newline convention.
fn match_trailing_newline(original: &str, mut suggestion: String) -> String {
    if original.ends_with('\n') && !suggestion.ends_with('\n') {
        suggestion.push('\n');
    }
    suggestion
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `POST /chat/completions` client.
pub struct ChatCompletionsService {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

impl ChatCompletionsService {
    pub fn new(settings: &SuggestionSettings, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemedyError::Suggestion(format!("http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            api_key,
        })
    }

    async fn complete(&self, user: &str, max_tokens: Option<u32>) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens,
        };

        let mut builder = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| RemedyError::Suggestion(e.without_url().to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RemedyError::Suggestion(e.without_url().to_string()))?;
        if !status.is_success() {
            return Err(RemedyError::Suggestion(format!(
                "status {}: {}",
                status.as_u16(),
                sanitize_error_body(&text)
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| RemedyError::Suggestion(format!("unreadable response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RemedyError::Suggestion("response has no choices".to_string()))
    }
}

#[async_trait]
impl SuggestionService for ChatCompletionsService {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<String> {
        debug!(path = %request.path, issues = request.issues.len(), model = %self.model, "Requesting suggestion");
        let raw = self.complete(&build_prompt(request), None).await?;
        let content = strip_code_fence(&raw);
        if content.trim().is_empty() {
            return Err(RemedyError::Suggestion("empty suggestion".to_string()));
        }
        info!(path = %request.path, bytes = content.len(), "Suggestion received");
        Ok(match_trailing_newline(&request.content, content))
    }

    async fn probe(&self) -> Result<()> {
        self.complete("Reply with OK.", Some(1)).await.map(|_| ())
    }
}
