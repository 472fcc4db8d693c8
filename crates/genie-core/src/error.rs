//! Unified error handling for landing-genie core.
//!
//! This module provides a unified error type that wraps domain and application
//! errors, with rich context and user-actionable suggestions.

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// Root error type for genie-core operations.
///
/// This enum wraps all possible errors that can occur when using genie-core,
/// providing a unified interface for error handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenieError {
    /// Errors from the domain layer (business logic violations).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Errors from the application layer (orchestration failures).
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Configuration or setup errors.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal errors (bugs).
    #[error("internal error: {message}. This is a bug, please report it.")]
    Internal { message: String },
}

impl GenieError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Application(e) => e.suggestions(),
            Self::Configuration { message } => vec![
                format!("Configuration issue: {message}"),
                "Run: landing-genie config list to inspect the effective settings".into(),
            ],
            Self::Internal { .. } => vec![
                "This appears to be a bug in landing-genie".into(),
                "Re-run with -vvv and include the log when reporting it".into(),
            ],
        }
    }

    /// Get error category for display/styling purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.category() {
                crate::domain::ErrorCategory::Validation => ErrorCategory::Validation,
                crate::domain::ErrorCategory::Internal => ErrorCategory::Internal,
            },
            Self::Application(e) => e.category(),
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Check if re-running the same command may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Application(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<crate::application::ports::PlatformError> for GenieError {
    fn from(e: crate::application::ports::PlatformError) -> Self {
        Self::Application(e.into())
    }
}

impl From<crate::application::ports::UploadError> for GenieError {
    fn from(e: crate::application::ports::UploadError) -> Self {
        Self::Application(e.into())
    }
}

/// Error categories for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Configuration,
    Platform,
    Conflict,
    Interrupted,
    Internal,
}

/// Convenient result type alias.
pub type GenieResult<T> = Result<T, GenieError>;

/// Extension trait for adding context to errors.
pub trait Context<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> GenieResult<T>;
}

impl<T, E> Context<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> GenieResult<T> {
        self.map_err(|e| GenieError::Internal {
            message: format!("{}: {}", msg.into(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::PlatformError;

    #[test]
    fn platform_transport_errors_are_retryable() {
        let err: GenieError = PlatformError::transport("connection reset").into();
        assert!(err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Platform);

        let auth: GenieError = PlatformError::auth("bad token").into();
        assert!(!auth.is_retryable());
    }

    #[test]
    fn invalid_slug_is_validation() {
        let err: GenieError = crate::domain::Slug::parse("Bad!").unwrap_err().into();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(!err.suggestions().is_empty());
    }

    #[test]
    fn context_wraps_foreign_errors() {
        let res: Result<(), std::io::Error> = Err(std::io::Error::other("disk full"));
        let err = res.context("writing lock file").unwrap_err();
        assert!(err.to_string().contains("writing lock file: disk full"));
    }
}
