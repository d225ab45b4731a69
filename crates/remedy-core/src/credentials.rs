//! Credential lookup for the forge and the suggestion service.

pub const ENV_FORGE_TOKEN: &str = "REMEDY_FORGE_TOKEN";
pub const ENV_SUGGEST_KEY: &str = "REMEDY_SUGGEST_KEY";

/// Source of short-lived secrets. Implementations must not log values.
pub trait CredentialProvider: Send + Sync {
    fn forge_token(&self) -> Option<String>;
    fn suggestion_key(&self) -> Option<String>;
}

/// Reads `REMEDY_FORGE_TOKEN` and `REMEDY_SUGGEST_KEY` on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn forge_token(&self) -> Option<String> {
        non_empty_env(ENV_FORGE_TOKEN)
    }

    fn suggestion_key(&self) -> Option<String> {
        non_empty_env(ENV_SUGGEST_KEY)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Fixed credentials, for tests and embedding.
#[derive(Clone, Default)]
pub struct StaticCredentials {
    pub forge_token: Option<String>,
    pub suggestion_key: Option<String>,
}

impl StaticCredentials {
    pub fn new(forge_token: Option<&str>, suggestion_key: Option<&str>) -> Self {
        Self {
            forge_token: forge_token.map(str::to_string),
            suggestion_key: suggestion_key.map(str::to_string),
        }
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("forge_token", &self.forge_token.as_ref().map(|_| "***"))
            .field("suggestion_key", &self.suggestion_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl CredentialProvider for StaticCredentials {
    fn forge_token(&self) -> Option<String> {
        self.forge_token.clone()
    }

    fn suggestion_key(&self) -> Option<String> {
        self.suggestion_key.clone()
    }
}
