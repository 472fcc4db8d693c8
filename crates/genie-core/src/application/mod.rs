//! Application layer for landing-genie.
//!
//! This layer contains:
//! - **Services**: Use case orchestration (DeployService, AssetPipeline, SiteService)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Application-specific error types
//! - **Reports**: What a run did, for rendering by the CLI
//!
//! The application layer coordinates the domain layer but contains no
//! business logic itself. All business rules live in `crate::domain`.

pub mod config;
pub mod error;
pub mod ports;
pub mod report;
pub mod retry;
pub mod services;
pub mod sync;

// Re-export main services
pub use services::{AssetPipeline, DeployService, ImagesRequest, SiteService, SiteSummary};

// Re-export port traits (for adapter implementation)
pub use ports::{
    ImageProvider, PlatformClient, ProgressSink, RateLimiter, SiteLock, SiteProbe, SiteStore,
    UploadTool,
};

pub use config::{DeployConfig, PipelineConfig};
pub use error::ApplicationError;
pub use report::{
    DeployFailure, DeployReport, DeployWarning, ImagesReport, ImagesSummary, SlotOutcome,
    SlotReport,
};
pub use retry::RetryPolicy;
pub use sync::{InProcessSiteLock, IntervalRateLimiter};
