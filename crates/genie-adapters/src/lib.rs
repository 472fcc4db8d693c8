//! Infrastructure adapters for landing-genie.
//!
//! This crate implements the ports defined in `genie-core::application::ports`.
//! It contains all external dependencies and I/O operations: the sites
//! directory, Cloudflare and wrangler, Gemini, file locks and HTTP probes.
//! Each production adapter has an in-memory counterpart for tests.

pub mod filesystem;
pub mod generation;
pub mod locks;
pub mod platform;
pub mod probe;

// Re-export commonly used adapters
pub use filesystem::{LocalSiteStore, MemorySiteStore};
pub use generation::{GeminiCredentials, GeminiImageProvider, ScriptedImageProvider};
pub use locks::{FileRateLimiter, FileSiteLock};
pub use platform::{CloudflareClient, CloudflareCredentials, MemoryPlatform, WranglerUploadTool};
pub use probe::HttpSiteProbe;
