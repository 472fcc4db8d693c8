//! Cross-process coordination through advisory file locks.
//!
//! Both types take the in-process lock first, so tasks in one process queue
//! in memory and only one of them at a time touches the lock file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use fs2::FileExt;
use genie_core::{
    application::{
        ApplicationError, InProcessSiteLock,
        ports::{LockGuard, RateLimiter, SiteLock},
    },
    domain::Slug,
    error::{GenieError, GenieResult},
};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, trace};

/// Exclusive lock per site: `<dir>/<slug>.lock`.
#[derive(Debug, Clone)]
pub struct FileSiteLock {
    dir: PathBuf,
    local: InProcessSiteLock,
}

impl FileSiteLock {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            local: InProcessSiteLock::new(),
        }
    }

    pub fn lock_path(&self, slug: &Slug) -> PathBuf {
        self.dir.join(format!("{slug}.lock"))
    }
}

struct HeldSiteLock {
    file: File,
    _local: OwnedMutexGuard<()>,
}

impl Drop for HeldSiteLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[async_trait]
impl SiteLock for FileSiteLock {
    async fn acquire(&self, slug: &Slug) -> GenieResult<LockGuard> {
        let local = self.local.lock(slug).await;
        let path = self.lock_path(slug);
        debug!(path = %path.display(), "Waiting for site lock");

        let file = tokio::task::spawn_blocking(move || -> io::Result<File> {
            let file = open_lock_file(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| GenieError::Internal {
            message: format!("lock task failed: {e}"),
        })?
        .map_err(|e| ApplicationError::Lock {
            slug: slug.to_string(),
            reason: e.to_string(),
        })?;

        Ok(LockGuard::new(HeldSiteLock {
            file,
            _local: local,
        }))
    }
}

/// Request budget shared by every process on the host.
///
/// The state file holds the next free slot as milliseconds since the epoch.
#[derive(Debug)]
pub struct FileRateLimiter {
    path: PathBuf,
    interval: Option<Duration>,
    local: tokio::sync::Mutex<()>,
}

impl FileRateLimiter {
    /// Zero disables limiting.
    pub fn per_minute(path: impl Into<PathBuf>, requests_per_minute: u32) -> Self {
        Self {
            path: path.into(),
            interval: (requests_per_minute > 0)
                .then(|| Duration::from_secs(60) / requests_per_minute),
            local: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl RateLimiter for FileRateLimiter {
    async fn acquire(&self) -> GenieResult<()> {
        let Some(interval) = self.interval else {
            return Ok(());
        };

        let wait = {
            let _local = self.local.lock().await;
            let path = self.path.clone();
            tokio::task::spawn_blocking(move || reserve_slot(&path, interval))
                .await
                .map_err(|e| GenieError::Internal {
                    message: format!("rate limiter task failed: {e}"),
                })?
                .map_err(|e| ApplicationError::Storage {
                    path: self.path.clone(),
                    reason: format!("failed to update rate limit state: {e}"),
                })?
        };

        if !wait.is_zero() {
            trace!(wait_ms = wait.as_millis() as u64, "Waiting for request slot");
            tokio::time::sleep(wait).await;
        }
        Ok(())
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

/// Claim the next slot and return how long until it opens.
fn reserve_slot(path: &Path, interval: Duration) -> io::Result<Duration> {
    let mut file = open_lock_file(path)?;
    file.lock_exclusive()?;

    let result = (|| -> io::Result<Duration> {
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        let stored: u64 = content.trim().parse().unwrap_or(0);

        let now = now_millis();
        let slot = stored.max(now);
        let next = slot + interval.as_millis() as u64;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        write!(file, "{next}")?;
        file.sync_all()?;
        Ok(Duration::from_millis(slot - now))
    })();

    let _ = FileExt::unlock(&file);
    result
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
