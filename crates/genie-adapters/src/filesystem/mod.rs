//! Site store adapters.

mod local;
mod memory;

pub use local::LocalSiteStore;
pub use memory::MemorySiteStore;
