//! Hosting platform adapters.

mod cloudflare;
mod memory;
mod wrangler;

pub use cloudflare::{API_BASE, CloudflareClient, CloudflareCredentials, PRODUCTION_BRANCH};
pub use memory::MemoryPlatform;
pub use wrangler::WranglerUploadTool;
