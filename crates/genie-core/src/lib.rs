//! landing-genie core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for landing-genie:
//! deploying a generated site to a live subdomain and filling its image
//! placeholders, following hexagonal (ports and adapters) architecture.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           genie-cli (CLI)               │
//! │     (Implements Driving Ports)          │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │  (DeployService, AssetPipeline, ...)    │
//! │         Orchestrates Use Cases          │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Application Ports (Traits)         │
//! │ (Platform, ImageProvider, SiteStore...) │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │    genie-adapters (Infrastructure)      │
//! │ (Cloudflare, Gemini, LocalSiteStore...) │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │ (naming, manifest, dns, assets, jobs)   │
//! │         No I/O                          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use genie_core::prelude::*;
//!
//! let service = DeployService::new(platform, sites, locks, probe, config);
//! let report = service
//!     .deploy("habitlab", &CancellationToken::new(), &NoProgress)
//!     .await?;
//! println!("live at {}", report.live_url());
//! ```

// Re-export domain layer (stable, well-defined API)
pub mod domain;

// Re-export application layer (orchestration logic)
pub mod application;

// Re-export error types
pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        AssetPipeline, DeployConfig, DeployFailure, DeployReport, DeployService, ImagesReport,
        ImagesRequest, PipelineConfig, SiteService,
        ports::{
            ImageProvider, NoProgress, PlatformClient, ProgressSink, RateLimiter, SiteLock,
            SiteProbe, SiteStore, UploadTool,
        },
    };
    pub use crate::domain::{
        ResolutionTier, ResourceNames, RootDomain, SiteManifest, Slug, resolve,
    };
    pub use crate::error::{GenieError, GenieResult};
    pub use tokio_util::sync::CancellationToken;
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
