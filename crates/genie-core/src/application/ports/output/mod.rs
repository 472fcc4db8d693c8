//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the application needs from external systems.
//! The `genie-adapters` crate provides implementations.

mod generation;
mod platform;
mod probe;
mod progress;
mod storage;
mod sync;

pub use generation::{GeneratedImage, ImageProvider, ProviderError, TokenUsage};
pub use platform::{
    PlatformClient, PlatformError, PlatformErrorKind, UploadError, UploadErrorKind, UploadTool,
};
pub use probe::SiteProbe;
pub use progress::{NoProgress, ProgressSink};
pub use storage::SiteStore;
pub use sync::{LockGuard, RateLimiter, SiteLock};

#[cfg(test)]
pub use generation::MockImageProvider;
#[cfg(test)]
pub use platform::MockPlatformClient;
#[cfg(test)]
pub use probe::MockSiteProbe;
#[cfg(test)]
pub use storage::MockSiteStore;
