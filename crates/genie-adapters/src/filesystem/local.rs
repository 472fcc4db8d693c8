//! Local sites directory adapter.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use genie_core::{
    application::{ApplicationError, ports::SiteStore},
    domain::{AssetState, DomainError, ManifestEntry, SiteManifest, Slug},
    error::{GenieError, GenieResult},
};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Production site store: one directory per slug under `root`.
#[derive(Debug, Clone)]
pub struct LocalSiteStore {
    root: PathBuf,
}

impl LocalSiteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a site-relative path to a filesystem path inside the site.
    fn resolve(&self, slug: &Slug, rel: &str) -> GenieResult<PathBuf> {
        let rel_path = Path::new(rel);
        let safe = !rel.is_empty()
            && rel_path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(DomainError::InvalidAssetPath {
                path: rel.to_string(),
                reason: "path must stay inside the site directory".into(),
            }
            .into());
        }
        Ok(self.site_dir(slug).join(rel_path))
    }
}

impl SiteStore for LocalSiteStore {
    fn site_dir(&self, slug: &Slug) -> PathBuf {
        self.root.join(slug.as_str())
    }

    fn exists(&self, slug: &Slug) -> bool {
        self.site_dir(slug).is_dir()
    }

    /// The page generator sometimes nests its output one level too deep.
    fn normalize_layout(&self, slug: &Slug) -> GenieResult<bool> {
        let site_dir = self.site_dir(slug);
        let nested = site_dir.join("sites").join(slug.as_str());
        if !nested.is_dir() {
            return Ok(false);
        }

        let entries = fs::read_dir(&nested).map_err(|e| map_io_error(&nested, e, "read directory"))?;
        for entry in entries {
            let entry = entry.map_err(|e| map_io_error(&nested, e, "read directory"))?;
            let dest = site_dir.join(entry.file_name());
            if dest.is_dir() {
                fs::remove_dir_all(&dest).map_err(|e| map_io_error(&dest, e, "remove directory"))?;
            } else if dest.exists() {
                fs::remove_file(&dest).map_err(|e| map_io_error(&dest, e, "remove file"))?;
            }
            fs::rename(entry.path(), &dest).map_err(|e| map_io_error(&dest, e, "move file"))?;
        }

        // Leftover directories are removed only if empty.
        for dir in [nested.as_path(), site_dir.join("sites").as_path()] {
            let _ = fs::remove_dir(dir);
        }
        info!(slug = %slug, "Flattened nested site directory");
        Ok(true)
    }

    fn list_sites(&self) -> GenieResult<Vec<Slug>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(map_io_error(&self.root, e, "list sites")),
        };

        let mut slugs: Vec<Slug> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| e.file_name().to_str().and_then(|n| Slug::parse(n).ok()))
            .collect();
        slugs.sort();
        Ok(slugs)
    }

    fn manifest(&self, slug: &Slug) -> GenieResult<SiteManifest> {
        let site_dir = self.site_dir(slug);
        let mut entries = Vec::new();

        let walker = WalkDir::new(&site_dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| site_dir.clone(), Path::to_path_buf);
                map_io_error(&path, io::Error::other(e.to_string()), "walk site")
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(&site_dir)
                .map_err(|e| GenieError::Internal {
                    message: format!("walkdir left the site directory: {e}"),
                })?;
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = fs::read(entry.path()).map_err(|e| map_io_error(entry.path(), e, "read file"))?;
            entries.push(ManifestEntry::new(rel, &content));
        }

        debug!(slug = %slug, files = entries.len(), "Built manifest");
        Ok(SiteManifest::new(slug.clone(), entries))
    }

    fn read_text(&self, slug: &Slug, path: &str) -> GenieResult<String> {
        let full = self.resolve(slug, path)?;
        fs::read_to_string(&full).map_err(|e| map_io_error(&full, e, "read file"))
    }

    fn asset_state(&self, slug: &Slug, path: &str) -> GenieResult<AssetState> {
        let full = self.resolve(slug, path)?;
        match fs::metadata(&full) {
            Ok(meta) if meta.is_file() => Ok(AssetState::from_size(Some(meta.len()))),
            Ok(_) => Err(map_io_error(
                &full,
                io::Error::other("not a regular file"),
                "inspect asset",
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(AssetState::Missing),
            Err(e) => Err(map_io_error(&full, e, "inspect asset")),
        }
    }

    fn write_asset_atomic(&self, slug: &Slug, path: &str, bytes: &[u8]) -> GenieResult<()> {
        let target = self.resolve(slug, path)?;
        let parent = target.parent().ok_or_else(|| GenieError::Internal {
            message: format!("asset path {} has no parent", target.display()),
        })?;
        fs::create_dir_all(parent).map_err(|e| map_io_error(parent, e, "create directory"))?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| map_io_error(parent, e, "create temp file"))?;
        tmp.write_all(bytes)
            .map_err(|e| map_io_error(tmp.path(), e, "write temp file"))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| map_io_error(tmp.path(), e, "sync temp file"))?;
        tmp.persist(&target)
            .map_err(|e| map_io_error(&target, e.error, "replace file"))?;

        debug!(path = %target.display(), bytes = bytes.len(), "Asset written");
        Ok(())
    }
}

fn map_io_error(path: &Path, e: io::Error, operation: &str) -> GenieError {
    ApplicationError::Storage {
        path: path.to_path_buf(),
        reason: format!("failed to {operation}: {e}"),
    }
    .into()
}
