//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "deploy a site" or "fill its images".

pub mod asset_pipeline;
pub mod deploy_service;
pub mod site_service;

pub use asset_pipeline::{AssetPipeline, ImagesRequest};
pub use deploy_service::DeployService;
pub use site_service::{SiteService, SiteSummary};
