//! Application layer errors.
//!
//! These errors represent failures in orchestration, not business logic.
//! Business logic errors are `DomainError` from `crate::domain`.

use std::path::PathBuf;
use thiserror::Error;

use crate::application::ports::{PlatformError, UploadError};
use crate::domain::RecordType;
use crate::error::ErrorCategory;

/// Errors that occur during application orchestration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    /// No site directory exists for the slug.
    #[error("site '{slug}' not found at {path}")]
    SiteNotFound { slug: String, path: PathBuf },

    /// The site directory has no files to deploy.
    #[error("site '{slug}' has no files")]
    EmptySite { slug: String },

    /// Reading or writing site files failed.
    #[error("storage error at {path}: {reason}")]
    Storage { path: PathBuf, reason: String },

    /// The hosting platform rejected or failed a call.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The upload tool failed after all attempts.
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The hostname is held by a DNS record this tool did not create.
    #[error("{fqdn} already has a {record_type} record pointing at {content} that was not created by landing-genie")]
    DomainConflict {
        fqdn: String,
        record_type: RecordType,
        content: String,
    },

    /// The per-site lock could not be taken.
    #[error("could not lock site '{slug}': {reason}")]
    Lock { slug: String, reason: String },

    /// The run was interrupted before it finished.
    #[error("operation cancelled")]
    Cancelled,
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::SiteNotFound { slug, path } => vec![
                format!("Expected the site files for '{slug}' in {}", path.display()),
                "Run: landing-genie list to see available sites".into(),
                "Use --sites-dir if your sites live elsewhere".into(),
            ],
            Self::EmptySite { .. } => vec![
                "Generate the site first, then deploy it".into(),
            ],
            Self::Storage { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
            ],
            Self::Platform(e) => e.suggestions(),
            Self::Upload(e) => e.suggestions(),
            Self::DomainConflict { fqdn, .. } => vec![
                format!("Remove or rename the existing DNS record for {fqdn} in Cloudflare"),
                "Or deploy this site under a different slug".into(),
                "landing-genie never overwrites records it did not create".into(),
            ],
            Self::Lock { .. } => vec![
                "Another landing-genie process is working on this site".into(),
                "Wait for it to finish and try again".into(),
            ],
            Self::Cancelled => vec![
                "Re-run the same command to resume; completed work is kept".into(),
            ],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SiteNotFound { .. } => ErrorCategory::NotFound,
            Self::EmptySite { .. } => ErrorCategory::Validation,
            Self::Storage { .. } | Self::Lock { .. } => ErrorCategory::Internal,
            Self::Platform(_) | Self::Upload(_) => ErrorCategory::Platform,
            Self::DomainConflict { .. } => ErrorCategory::Conflict,
            Self::Cancelled => ErrorCategory::Interrupted,
        }
    }

    /// Whether re-running the same command may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Platform(e) => e.is_retryable(),
            Self::Upload(e) => e.is_transient(),
            Self::Lock { .. } | Self::Cancelled => true,
            _ => false,
        }
    }
}
