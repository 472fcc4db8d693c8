//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `genie-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `PlatformClient` / `UploadTool`: hosting platform and its deploy tool
//!   - `ImageProvider`: image generation
//!   - `SiteStore`: local site files
//!   - `SiteLock` / `RateLimiter`: shared state across runs
//!   - `SiteProbe`: post-deploy verification
//!   - `ProgressSink`: progress reporting
//!
//! - **Driving (Input) Ports**: Called by external world, implemented by application
//!   - (Defined in CLI layer, implemented by services)

pub mod output;

pub use output::*;
