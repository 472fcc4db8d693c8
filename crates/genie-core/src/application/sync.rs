//! In-process implementations of the shared-state ports.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ApplicationError;
use crate::application::ports::{LockGuard, RateLimiter, SiteLock};
use crate::domain::Slug;
use crate::error::GenieResult;

/// Wait for the site lock, giving up as soon as `cancel` fires.
///
/// A free lock is taken even if the token is already cancelled; the caller's
/// next cancellation check stops the run.
pub(crate) async fn acquire_or_cancel(
    locks: &dyn SiteLock,
    slug: &Slug,
    cancel: &CancellationToken,
) -> GenieResult<LockGuard> {
    tokio::select! {
        biased;
        guard = locks.acquire(slug) => guard,
        _ = cancel.cancelled() => {
            tracing::info!(slug = %slug, "Cancelled while waiting for the site lock");
            Err(ApplicationError::Cancelled.into())
        }
    }
}

/// Keyed async mutex: one holder per slug, different slugs proceed in parallel.
#[derive(Debug, Clone, Default)]
pub struct InProcessSiteLock {
    slots: Arc<Mutex<HashMap<Slug, Arc<tokio::sync::Mutex<()>>>>>,
}

impl InProcessSiteLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the slug's mutex and return its owned guard.
    pub async fn lock(&self, slug: &Slug) -> tokio::sync::OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(slug.clone()).or_default())
        };
        slot.lock_owned().await
    }
}

#[async_trait]
impl SiteLock for InProcessSiteLock {
    async fn acquire(&self, slug: &Slug) -> GenieResult<LockGuard> {
        Ok(LockGuard::new(self.lock(slug).await))
    }
}

/// Spaces requests evenly: at most `requests_per_minute` slots per minute.
#[derive(Debug)]
pub struct IntervalRateLimiter {
    interval: Option<Duration>,
    next_slot: tokio::sync::Mutex<Option<Instant>>,
}

impl IntervalRateLimiter {
    /// Zero disables limiting.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let interval = (requests_per_minute > 0)
            .then(|| Duration::from_secs(60) / requests_per_minute);
        Self {
            interval,
            next_slot: tokio::sync::Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Reserve the next free slot and return how long until it opens.
    async fn reserve(&self, interval: Duration) -> Duration {
        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        let slot = next.map_or(now, |n| n.max(now));
        *next = Some(slot + interval);
        slot - now
    }
}

#[async_trait]
impl RateLimiter for IntervalRateLimiter {
    async fn acquire(&self) -> GenieResult<()> {
        let Some(interval) = self.interval else {
            return Ok(());
        };
        let wait = self.reserve(interval).await;
        if !wait.is_zero() {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Waiting for rate budget");
            tokio::time::sleep(wait).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_spaces_requests() {
        let limiter = IntervalRateLimiter::per_minute(60);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_means_unlimited() {
        let limiter = IntervalRateLimiter::per_minute(0);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(limiter.interval().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_for_a_held_lock_stops_on_cancel() {
        let locks = InProcessSiteLock::new();
        let slug = Slug::parse("habitlab").unwrap();
        let _held = locks.acquire(&slug).await.unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            acquire_or_cancel(&locks, &slug, &cancel),
        )
        .await
        .expect("cancel must end the wait");
        assert!(matches!(
            result,
            Err(crate::error::GenieError::Application(ApplicationError::Cancelled))
        ));
    }

    #[tokio::test]
    async fn free_lock_is_taken_even_when_cancelled() {
        let locks = InProcessSiteLock::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let slug = Slug::parse("habitlab").unwrap();
        assert!(acquire_or_cancel(&locks, &slug, &cancel).await.is_ok());
    }

    #[tokio::test]
    async fn same_slug_is_exclusive_other_slugs_are_not() {
        let locks = InProcessSiteLock::new();
        let a = Slug::parse("alpha").unwrap();
        let b = Slug::parse("beta").unwrap();

        let held = locks.acquire(&a).await.unwrap();
        // A different slug is free while alpha is held.
        let _other = locks.acquire(&b).await.unwrap();

        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&a)).await;
        assert!(second.is_err(), "alpha must stay locked");

        drop(held);
        let third = tokio::time::timeout(Duration::from_millis(500), locks.acquire(&a)).await;
        assert!(third.is_ok());
    }
}
