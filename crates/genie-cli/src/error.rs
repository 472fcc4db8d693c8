//! Error handling for the landing-genie CLI.
//!
//! Provides structured errors with:
//! - User-friendly messages
//! - Actionable suggestions
//! - Proper error chaining
//! - Exit code mapping

use std::error::Error;

use owo_colors::OwoColorize;
use thiserror::Error;

use genie_core::{
    application::{ApplicationError, DeployFailure},
    error::GenieError,
};

// Re-export so callers only need `use crate::error::*`.
pub use genie_core::error::ErrorCategory as CoreCategory;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input (validation failed).
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ── Config errors ──────────────────────────────────────────────────────
    /// A required setting has no value in any configuration layer.
    #[error("Missing setting '{key}' (set {env} or add it to the config file)")]
    MissingSetting {
        key: &'static str,
        env: &'static str,
    },

    /// A configuration file could not be read, parsed, or written.
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ── Core errors ────────────────────────────────────────────────────────
    /// An error propagated from `genie-core`.
    #[error(transparent)]
    Core(#[from] GenieError),

    /// A deploy stopped before the site was live.
    #[error(transparent)]
    Deploy(Box<DeployFailure>),

    /// The image provider ran out of quota part-way; finished images are kept.
    #[error("Image quota exhausted: {generated} generated, {remaining} left for a later run")]
    QuotaExhausted { generated: usize, remaining: usize },

    // ── System errors ──────────────────────────────────────────────────────
    /// An I/O operation failed.
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Operation cancelled by user.
    #[error("Operation cancelled")]
    Cancelled,

    /// Feature not available (e.g., interactive mode without feature flag).
    #[error("Feature not available: {feature}")]
    FeatureNotAvailable { feature: &'static str },
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::IoError {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<DeployFailure> for CliError {
    fn from(failure: DeployFailure) -> Self {
        CliError::Deploy(Box::new(failure))
    }
}

impl CliError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidInput { message, .. } => vec![
                format!("Check your input: {message}"),
                "Use --help for usage information".into(),
            ],

            Self::MissingSetting { key, env } => vec![
                format!("Export {env}, or put it in a .env file next to where you run landing-genie"),
                format!("Or set '{key}' in the config file: landing-genie config path"),
            ],

            Self::ConfigError { message, .. } => vec![
                format!("Configuration issue: {message}"),
                "Check your config file: landing-genie config path".into(),
                "Use 'landing-genie init' to create a default config".into(),
            ],

            Self::Core(core_err) => core_err.suggestions(),

            Self::Deploy(failure) => {
                let mut out = failure.error.suggestions();
                if failure.retryable {
                    out.push(format!(
                        "Safe to re-run: landing-genie deploy {}",
                        failure.slug
                    ));
                }
                out
            }

            Self::QuotaExhausted { .. } => vec![
                "Generated images were saved; re-run the same command later to fill the rest".into(),
                "Check your Gemini quota and billing settings".into(),
            ],

            Self::IoError { message, .. } => vec![
                format!("I/O operation failed: {message}"),
                "Check file permissions".into(),
                "Ensure the parent directory exists".into(),
            ],

            Self::Cancelled => vec![
                "Operation was cancelled".into(),
                "Re-run the same command to resume; completed work is kept".into(),
            ],

            Self::FeatureNotAvailable { feature } => vec![
                format!("The '{feature}' feature is not available in this build"),
                format!("Install with the feature enabled: cargo install genie-cli --features {feature}"),
            ],
        }
    }

    /// Get the error category for styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput { .. } => ErrorCategory::UserError,
            Self::MissingSetting { .. }
            | Self::ConfigError { .. }
            | Self::FeatureNotAvailable { .. } => ErrorCategory::Configuration,
            Self::Core(core) => core_category(core),
            Self::Deploy(failure) => core_category(&failure.error),
            Self::QuotaExhausted { .. } => ErrorCategory::Quota,
            Self::IoError { .. } => ErrorCategory::Internal,
            Self::Cancelled => ErrorCategory::Interrupted,
        }
    }

    /// Exit code to pass to the OS.
    ///
    /// | Meaning                              | Code |
    /// |--------------------------------------|------|
    /// | Internal / storage / lock            |  1   |
    /// | Invalid slug, missing or empty site  |  2   |
    /// | Configuration                        |  4   |
    /// | Image quota exhausted                |  5   |
    /// | Platform API                         |  10  |
    /// | Upload tool                          |  11  |
    /// | DNS record owned by someone else     |  12  |
    /// | Cancelled                            |  130 |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Core(e) => core_exit_code(e),
            Self::Deploy(failure) => core_exit_code(&failure.error),
            _ => match self.category() {
                ErrorCategory::UserError | ErrorCategory::NotFound => 2,
                ErrorCategory::Configuration => 4,
                ErrorCategory::Quota => 5,
                ErrorCategory::Platform => 10,
                ErrorCategory::Conflict => 12,
                ErrorCategory::Interrupted => 130,
                ErrorCategory::Internal => 1,
            },
        }
    }

    /// Format the error for display with colors and suggestions.
    pub fn format_colored(&self, verbose: bool) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\n{} {}\n\n",
            "✗".red().bold(),
            "Error:".red().bold()
        ));

        output.push_str(&format!("  {}\n", self.to_string().red()));

        if verbose {
            let mut source = self.source();
            while let Some(err) = source {
                output.push_str(&format!(
                    "\n  {} {}\n",
                    "→".dimmed(),
                    err.to_string().dimmed()
                ));
                source = err.source();
            }
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str(&format!("\n{}\n", "Suggestions:".yellow().bold()));
            for suggestion in suggestions {
                output.push_str(&format!("  {suggestion}\n"));
            }
        }

        if !verbose {
            output.push('\n');
            output.push_str(&format!(
                "{} {}\n",
                "\u{2139}".blue(), // ℹ
                "Use -v / --verbose for more details.".dimmed(),
            ));
        }

        output
    }

    /// Plain-text version of [`Self::format_colored`], without ANSI codes.
    pub fn format_plain(&self, verbose: bool) -> String {
        let mut out = String::new();
        out.push_str(&format!("\nError: {self}\n"));

        if verbose {
            let mut src = std::error::Error::source(self);
            while let Some(err) = src {
                out.push_str(&format!("  Caused by: {err}\n"));
                src = err.source();
            }
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            out.push_str("\nSuggestions:\n");
            for s in &suggestions {
                out.push_str(&format!("  {s}\n"));
            }
        }

        if !verbose {
            out.push_str("\nUse -v / --verbose for more details.\n");
        }

        out
    }

    /// Log the error using tracing.
    pub fn log(&self) {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::NotFound => {
                tracing::warn!("User error: {}", self)
            }
            ErrorCategory::Interrupted => tracing::warn!("Interrupted: {}", self),
            ErrorCategory::Quota => tracing::warn!("Quota: {}", self),
            ErrorCategory::Configuration => tracing::error!("Configuration error: {}", self),
            ErrorCategory::Platform | ErrorCategory::Conflict => {
                tracing::error!("Deploy error: {}", self)
            }
            ErrorCategory::Internal => tracing::error!("Internal error: {}", self),
        }

        if let Some(source) = self.source() {
            tracing::debug!("Caused by: {}", source);
        }
    }
}

fn core_category(err: &GenieError) -> ErrorCategory {
    match err.category() {
        CoreCategory::Validation => ErrorCategory::UserError,
        CoreCategory::NotFound => ErrorCategory::NotFound,
        CoreCategory::Configuration => ErrorCategory::Configuration,
        CoreCategory::Platform => ErrorCategory::Platform,
        CoreCategory::Conflict => ErrorCategory::Conflict,
        CoreCategory::Interrupted => ErrorCategory::Interrupted,
        CoreCategory::Internal => ErrorCategory::Internal,
    }
}

fn core_exit_code(err: &GenieError) -> u8 {
    match err {
        GenieError::Application(ApplicationError::Upload(_)) => 11,
        GenieError::Application(ApplicationError::Platform(_)) => 10,
        GenieError::Application(ApplicationError::DomainConflict { .. }) => 12,
        GenieError::Application(ApplicationError::Cancelled) => 130,
        _ => match core_category(err) {
            ErrorCategory::UserError | ErrorCategory::NotFound => 2,
            ErrorCategory::Configuration => 4,
            _ => 1,
        },
    }
}

/// Error categories for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User input error (validation, invalid arguments).
    UserError,
    /// Site not found.
    NotFound,
    /// Configuration error.
    Configuration,
    /// The image provider refused further requests.
    Quota,
    /// Hosting platform or upload tool failure.
    Platform,
    /// A remote resource is owned by someone else.
    Conflict,
    /// Ctrl-C.
    Interrupted,
    /// Internal/system error.
    Internal,
}

// ── IntoCli trait ─────────────────────────────────────────────────────────────

/// Extension trait to convert foreign error types into [`CliError`] at
/// call-sites with a descriptive context message.
pub trait IntoCli<T> {
    /// Convert to `CliResult` attaching a human-readable context message.
    fn with_cli_context<F, S>(self, f: F) -> CliResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IntoCli<T> for Result<T, std::io::Error> {
    fn with_cli_context<F, S>(self, f: F) -> CliResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| CliError::IoError {
            message: f().into(),
            source: e,
        })
    }
}
