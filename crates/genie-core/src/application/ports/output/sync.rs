use async_trait::async_trait;

use crate::domain::Slug;
use crate::error::GenieResult;

/// Held for the duration of a run; the lock is released on drop.
pub struct LockGuard {
    _inner: Box<dyn Send>,
}

impl LockGuard {
    pub fn new<G: Send + 'static>(guard: G) -> Self {
        Self {
            _inner: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LockGuard")
    }
}

/// Mutual exclusion per site, across tasks and, where supported, processes.
///
/// Implemented by:
/// - `crate::application::sync::InProcessSiteLock`
/// - `genie_adapters::locks::FileSiteLock` (adds an advisory file lock)
#[async_trait]
pub trait SiteLock: Send + Sync {
    /// Wait until the site is free and take it.
    async fn acquire(&self, slug: &Slug) -> GenieResult<LockGuard>;
}

/// Shared request budget for the image provider.
///
/// Implemented by:
/// - `crate::application::sync::IntervalRateLimiter` (one process)
/// - `genie_adapters::locks::FileRateLimiter` (all processes on the host)
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait for the next request slot. Requests over budget queue here.
    async fn acquire(&self) -> GenieResult<()>;
}
