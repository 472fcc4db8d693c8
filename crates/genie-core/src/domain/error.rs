// ============================================================================
// domain/error.rs - VALIDATION ERRORS FOR PURE DOMAIN LOGIC
// ============================================================================

use thiserror::Error;

/// Root domain error type.
///
/// All errors are:
/// - Cloneable (reports keep them around after the run)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    // ========================================================================
    // Validation Errors (400-level equivalent)
    // ========================================================================
    #[error("invalid slug '{slug}': {reason}")]
    InvalidSlug { slug: String, reason: String },

    #[error("invalid root domain '{domain}': {reason}")]
    InvalidRootDomain { domain: String, reason: String },

    #[error("asset path '{path}' is not allowed: {reason}")]
    InvalidAssetPath { path: String, reason: String },

    #[error("unknown resolution tier '{0}' (expected 1K, 2K or 4K)")]
    UnknownResolutionTier(String),

    // ========================================================================
    // Invariant violations
    // ========================================================================
    #[error("generation job for '{src}' already has output")]
    OutputAlreadyWritten { src: String },

    #[error("generation job for '{src}' cannot move from {from} to {to}")]
    InvalidJobTransition {
        src: String,
        from: &'static str,
        to: &'static str,
    },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidSlug { slug, .. } => vec![
                format!("'{slug}' cannot be used as a subdomain"),
                "Use lowercase letters, digits and hyphens (a-z, 0-9, '-')".into(),
                "Do not start or end the slug with a hyphen".into(),
                "Example: landing-genie deploy habitlab".into(),
            ],
            Self::InvalidRootDomain { domain, .. } => vec![
                format!("'{domain}' is not a usable root domain"),
                "Set ROOT_DOMAIN to a zone in your Cloudflare account, e.g. example.com".into(),
            ],
            Self::InvalidAssetPath { path, .. } => vec![
                format!("Image source '{path}' was ignored"),
                "Reference images with relative paths such as assets/hero.png".into(),
            ],
            Self::UnknownResolutionTier(_) => {
                vec!["Use one of: 1K, 2K, 4K".into()]
            }
            _ => vec!["This is an internal invariant violation, please report it".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSlug { .. }
            | Self::InvalidRootDomain { .. }
            | Self::InvalidAssetPath { .. }
            | Self::UnknownResolutionTier(_) => ErrorCategory::Validation,
            Self::OutputAlreadyWritten { .. } | Self::InvalidJobTransition { .. } => {
                ErrorCategory::Internal
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Internal,
}
