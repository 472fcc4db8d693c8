//! Deterministic image provider for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use genie_core::{
    application::ports::{GeneratedImage, ImageProvider, ProviderError},
    domain::ResolutionTier,
};

type Script = dyn Fn(usize, &str) -> Result<GeneratedImage, ProviderError> + Send + Sync;

/// Answers each call from a script keyed by the call number (1-based) and
/// the prompt.
pub struct ScriptedImageProvider {
    model: String,
    script: Box<Script>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, ResolutionTier)>>,
}

impl std::fmt::Debug for ScriptedImageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedImageProvider")
            .field("model", &self.model)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl ScriptedImageProvider {
    pub fn new<F>(model: impl Into<String>, script: F) -> Self
    where
        F: Fn(usize, &str) -> Result<GeneratedImage, ProviderError> + Send + Sync + 'static,
    {
        Self {
            model: model.into(),
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call returns a small image whose bytes name the call number.
    pub fn succeeding(model: impl Into<String>) -> Self {
        Self::new(model, |call, _| Ok(image(format!("image-{call}").into_bytes())))
    }

    /// Succeeds `n` times, then reports the quota as spent.
    pub fn quota_after(model: impl Into<String>, n: usize) -> Self {
        Self::new(model, move |call, _| {
            if call <= n {
                Ok(image(format!("image-{call}").into_bytes()))
            } else {
                Err(ProviderError::QuotaExhausted("daily quota spent".into()))
            }
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts and tiers received, in call order.
    pub fn requests(&self) -> Vec<(String, ResolutionTier)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Wrap raw bytes as a PNG response.
pub fn image(bytes: Vec<u8>) -> GeneratedImage {
    GeneratedImage {
        bytes,
        mime_type: Some("image/png".into()),
        usage: None,
    }
}

#[async_trait]
impl ImageProvider for ScriptedImageProvider {
    fn model(&self) -> String {
        self.model.clone()
    }

    async fn generate(&self, prompt: &str, tier: ResolutionTier) -> Result<GeneratedImage, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((prompt.to_string(), tier));
        (self.script)(call, prompt)
    }
}
