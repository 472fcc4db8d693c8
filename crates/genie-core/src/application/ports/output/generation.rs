use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ResolutionTier;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Timeouts, 5xx, rate limiting. Worth another attempt.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Policy rejection or malformed request. Retrying will not help.
    #[error("provider rejected the request: {0}")]
    Permanent(String),

    /// The account's quota is spent; no further requests should be sent.
    #[error("provider quota exhausted: {0}")]
    QuotaExhausted(String),
}

/// Token counts reported by the provider, when it reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Text-to-image provider.
///
/// Implemented by:
/// - `genie_adapters::generation::GeminiImageProvider` (production)
/// - `genie_adapters::generation::ScriptedImageProvider` (testing)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Model identifier used for pricing lookups.
    fn model(&self) -> String;

    async fn generate(
        &self,
        prompt: &str,
        tier: ResolutionTier,
    ) -> Result<GeneratedImage, ProviderError>;
}
