use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{DesiredRecord, DnsRecord, DomainAttachment, PagesProject, UpsertOutcome};

/// Broad class of a platform failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformErrorKind {
    /// Token missing, invalid or lacking a permission.
    Auth,
    /// Account limits reached.
    Quota,
    NotFound,
    /// Network failure or timeout before a response arrived.
    Transport,
    /// Any other error reported by the API.
    Api,
}

impl fmt::Display for PlatformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auth => "authentication",
            Self::Quota => "quota",
            Self::NotFound => "not found",
            Self::Transport => "transport",
            Self::Api => "api",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("platform {kind} error: {message}")]
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    pub message: String,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::Auth, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::Transport, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::Api, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::NotFound, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == PlatformErrorKind::Transport
    }

    pub fn suggestions(&self) -> Vec<String> {
        match self.kind {
            PlatformErrorKind::Auth => vec![
                "Check CLOUDFLARE_API_TOKEN and CLOUDFLARE_ACCOUNT_ID".into(),
                "The token needs Pages:Edit and DNS:Edit permissions".into(),
            ],
            PlatformErrorKind::Quota => vec![
                "Your Cloudflare account hit a limit".into(),
                "Free up projects or upgrade the plan, then re-run".into(),
            ],
            PlatformErrorKind::NotFound => vec![
                "Check that ROOT_DOMAIN is a zone in this Cloudflare account".into(),
            ],
            PlatformErrorKind::Transport => vec![
                "Check your network connection and re-run the command".into(),
            ],
            PlatformErrorKind::Api => vec![
                "Cloudflare rejected the request; see the message above".into(),
            ],
        }
    }
}

/// Kind of upload failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadErrorKind {
    /// Network or tool hiccup; worth another attempt.
    Transient,
    /// The attempt exceeded its time budget.
    Timeout,
    /// The upload tool is not installed.
    ToolMissing,
    /// The tool ran and refused the upload.
    Rejected,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("upload failed ({kind:?}): {message}")]
pub struct UploadError {
    pub kind: UploadErrorKind,
    pub message: String,
}

impl UploadError {
    pub fn new(kind: UploadErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(UploadErrorKind::Transient, message)
    }

    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, UploadErrorKind::Transient | UploadErrorKind::Timeout)
    }

    pub fn suggestions(&self) -> Vec<String> {
        match self.kind {
            UploadErrorKind::ToolMissing => vec![
                "Install wrangler: npm install -g wrangler".into(),
                "Or set deploy.wrangler_bin to its path".into(),
            ],
            UploadErrorKind::Rejected => vec![
                "Check the wrangler output above".into(),
                "Verify the Cloudflare credentials allow Pages deployments".into(),
            ],
            _ => vec!["Re-run the deploy; it is safe to repeat".into()],
        }
    }
}

/// Hosting platform operations used by a deployment.
///
/// Implemented by:
/// - `genie_adapters::platform::CloudflareClient` (production)
/// - `genie_adapters::platform::MemoryPlatform` (testing)
///
/// Each call is atomic from the caller's point of view.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// `Ok(None)` when no project has this name.
    async fn get_project(&self, name: &str) -> Result<Option<PagesProject>, PlatformError>;

    async fn create_project(&self, name: &str) -> Result<PagesProject, PlatformError>;

    /// Upload the contents of `local_dir` as a new production deployment.
    async fn upload_deployment(
        &self,
        name: &str,
        local_dir: &Path,
    ) -> Result<crate::domain::Deployment, UploadError>;

    /// Register `fqdn` as a custom domain of the project. Idempotent.
    async fn attach_domain(&self, name: &str, fqdn: &str)
    -> Result<DomainAttachment, PlatformError>;

    async fn get_dns_record(&self, zone: &str, name: &str)
    -> Result<Option<DnsRecord>, PlatformError>;

    /// Bring the record for `desired.name` in line with `desired`, following
    /// [`DnsRecord::reconcile`]. A conflict must not write anything.
    async fn upsert_dns_record(
        &self,
        zone: &str,
        desired: &DesiredRecord,
    ) -> Result<UpsertOutcome, PlatformError>;
}

/// External program that publishes a directory to a Pages project.
///
/// Implemented by `genie_adapters::platform::WranglerUploadTool`.
#[async_trait]
pub trait UploadTool: Send + Sync {
    /// Returns the deployment URL printed by the tool.
    async fn deploy(&self, local_dir: &Path, project_name: &str) -> Result<String, UploadError>;
}
