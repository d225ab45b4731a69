//! Repository reference validation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::RepositoryReference;
use crate::forge::Forge;

/// Predicate deciding whether a reference names a usable repository.
#[async_trait]
pub trait UrlValidator: Send + Sync {
    async fn check(&self, reference: &RepositoryReference) -> bool;
}

/// Probes `GET /repos/{owner}/{repo}`; only a 200 counts as valid.
pub struct ForgeValidator {
    forge: Arc<dyn Forge>,
}

impl ForgeValidator {
    pub fn new(forge: Arc<dyn Forge>) -> Self {
        Self { forge }
    }
}

#[async_trait]
impl UrlValidator for ForgeValidator {
    async fn check(&self, reference: &RepositoryReference) -> bool {
        match self.forge.repository_exists(reference).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(repository = %reference, error = %err, "Repository probe failed");
                false
            }
        }
    }
}

/// Validator with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticValidator(pub bool);

#[async_trait]
impl UrlValidator for StaticValidator {
    async fn check(&self, _reference: &RepositoryReference) -> bool {
        self.0
    }
}
