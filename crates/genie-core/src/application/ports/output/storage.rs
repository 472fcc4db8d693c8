use std::path::PathBuf;

use crate::domain::{AssetState, SiteManifest, Slug};
use crate::error::GenieResult;

/// Port for the local directory of generated sites.
///
/// Implemented by:
/// - `genie_adapters::filesystem::LocalSiteStore` (production)
/// - `genie_adapters::filesystem::MemorySiteStore` (testing)
///
/// ## Design Notes
///
/// - Paths passed in are `/`-separated and relative to the site directory
/// - Implementations must reject paths that leave the site directory
/// - Asset writes are all-or-nothing: readers see the old or the new file
#[cfg_attr(test, mockall::automock)]
pub trait SiteStore: Send + Sync {
    /// Directory the upload tool should publish.
    fn site_dir(&self, slug: &Slug) -> PathBuf;

    fn exists(&self, slug: &Slug) -> bool;

    /// Move a nested `sites/<slug>/` copy of the output up into the site
    /// directory; nested entries replace same-named ones. Returns `true` if
    /// anything moved. Callers hold the site lock.
    fn normalize_layout(&self, slug: &Slug) -> GenieResult<bool>;

    /// All site slugs, sorted.
    fn list_sites(&self) -> GenieResult<Vec<Slug>>;

    fn manifest(&self, slug: &Slug) -> GenieResult<SiteManifest>;

    fn read_text(&self, slug: &Slug, path: &str) -> GenieResult<String>;

    fn asset_state(&self, slug: &Slug, path: &str) -> GenieResult<AssetState>;

    /// Replace `path` atomically (temp file in the same directory, fsync,
    /// rename). Parent directories are created as needed.
    fn write_asset_atomic(&self, slug: &Slug, path: &str, bytes: &[u8]) -> GenieResult<()>;
}
