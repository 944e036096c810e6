pub mod anthropic;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

pub use anthropic::{AnthropicProvider, ProviderErrorKind};
pub use types::*;

pub const DEFAULT_ANTHROPIC_BASE: &str = "https://api.anthropic.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Prompt in, free text out. Callers own prompt construction and
/// interpretation of the returned text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}

/// Connection settings for the completion backend, resolved from the
/// application config and the credential environment variable.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    /// Defaults to the public Anthropic API.
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Create a provider from configuration. Fails when no usable credential is present.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let key = config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| anyhow!("anthropic requires api_key"))?;
    let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_ANTHROPIC_BASE);
    let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    tracing::info!(base_url, timeout_secs = timeout.as_secs(), "created anthropic provider");
    Ok(Arc::new(AnthropicProvider::with_timeout(
        key.to_string(),
        base_url,
        timeout,
    )))
}
