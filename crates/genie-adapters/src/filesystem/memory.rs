//! In-memory site store for testing.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use genie_core::{
    application::{ApplicationError, ports::SiteStore},
    domain::{AssetState, DomainError, ManifestEntry, SiteManifest, Slug},
    error::{GenieError, GenieResult},
};

/// Sites held as `slug -> path -> bytes`.
#[derive(Debug, Clone, Default)]
pub struct MemorySiteStore {
    inner: Arc<RwLock<MemorySiteStoreInner>>,
}

#[derive(Debug, Default)]
struct MemorySiteStoreInner {
    sites: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    writes: usize,
}

impl MemorySiteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, creating the site if needed (testing helper).
    pub fn insert(&self, slug: &str, path: &str, content: impl Into<Vec<u8>>) {
        self.write_lock()
            .sites
            .entry(slug.to_string())
            .or_default()
            .insert(path.to_string(), content.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_file(self, slug: &str, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(slug, path, content);
        self
    }

    /// Register a site with no files.
    pub fn with_empty_site(self, slug: &str) -> Self {
        self.write_lock().sites.entry(slug.to_string()).or_default();
        self
    }

    pub fn read(&self, slug: &str, path: &str) -> Option<Vec<u8>> {
        self.read_lock()
            .sites
            .get(slug)
            .and_then(|files| files.get(path))
            .cloned()
    }

    /// Number of `write_asset_atomic` calls that succeeded.
    pub fn write_count(&self) -> usize {
        self.read_lock().writes
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, MemorySiteStoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, MemorySiteStoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn missing(&self, slug: &Slug, path: &str) -> GenieError {
        ApplicationError::Storage {
            path: self.site_dir(slug).join(path),
            reason: "no such file".into(),
        }
        .into()
    }
}

fn check_path(path: &str) -> GenieResult<()> {
    let escapes = path.is_empty()
        || path.starts_with('/')
        || path.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if escapes {
        return Err(DomainError::InvalidAssetPath {
            path: path.to_string(),
            reason: "path must stay inside the site directory".into(),
        }
        .into());
    }
    Ok(())
}

impl SiteStore for MemorySiteStore {
    fn site_dir(&self, slug: &Slug) -> PathBuf {
        Path::new("/memory/sites").join(slug.as_str())
    }

    fn exists(&self, slug: &Slug) -> bool {
        self.read_lock().sites.contains_key(slug.as_str())
    }

    fn normalize_layout(&self, slug: &Slug) -> GenieResult<bool> {
        let prefix = format!("sites/{slug}/");
        let mut inner = self.write_lock();
        let Some(files) = inner.sites.get_mut(slug.as_str()) else {
            return Ok(false);
        };

        let nested: Vec<String> = files
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .cloned()
            .collect();
        if nested.is_empty() {
            return Ok(false);
        }

        let replaced: BTreeSet<&str> = nested
            .iter()
            .filter_map(|path| path[prefix.len()..].split('/').next())
            .collect();
        let displaced: Vec<String> = files
            .keys()
            .filter(|path| !path.starts_with(&prefix))
            .filter(|path| path.split('/').next().is_some_and(|top| replaced.contains(top)))
            .cloned()
            .collect();
        for path in displaced {
            files.remove(&path);
        }
        for path in &nested {
            if let Some(content) = files.remove(path) {
                files.insert(path[prefix.len()..].to_string(), content);
            }
        }
        Ok(true)
    }

    fn list_sites(&self) -> GenieResult<Vec<Slug>> {
        Ok(self
            .read_lock()
            .sites
            .keys()
            .filter_map(|name| Slug::parse(name).ok())
            .collect())
    }

    fn manifest(&self, slug: &Slug) -> GenieResult<SiteManifest> {
        let inner = self.read_lock();
        let entries = inner
            .sites
            .get(slug.as_str())
            .map(|files| {
                files
                    .iter()
                    .map(|(path, content)| ManifestEntry::new(path.clone(), content))
                    .collect()
            })
            .unwrap_or_default();
        Ok(SiteManifest::new(slug.clone(), entries))
    }

    fn read_text(&self, slug: &Slug, path: &str) -> GenieResult<String> {
        check_path(path)?;
        let bytes = self.read(slug.as_str(), path).ok_or_else(|| self.missing(slug, path))?;
        String::from_utf8(bytes).map_err(|e| {
            ApplicationError::Storage {
                path: self.site_dir(slug).join(path),
                reason: format!("not UTF-8: {e}"),
            }
            .into()
        })
    }

    fn asset_state(&self, slug: &Slug, path: &str) -> GenieResult<AssetState> {
        check_path(path)?;
        let size = self.read(slug.as_str(), path).map(|bytes| bytes.len() as u64);
        Ok(AssetState::from_size(size))
    }

    fn write_asset_atomic(&self, slug: &Slug, path: &str, bytes: &[u8]) -> GenieResult<()> {
        check_path(path)?;
        let mut inner = self.write_lock();
        inner
            .sites
            .entry(slug.as_str().to_string())
            .or_default()
            .insert(path.to_string(), bytes.to_vec());
        inner.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_placeholder_and_replaces_it() {
        let store = MemorySiteStore::new()
            .with_file("demo", "index.html", "<img src=\"assets/a.png\">")
            .with_file("demo", "assets/a.png", "");
        let slug = Slug::parse("demo").unwrap();

        assert_eq!(store.asset_state(&slug, "assets/a.png").unwrap(), AssetState::Placeholder);
        store.write_asset_atomic(&slug, "assets/a.png", b"img").unwrap();
        assert_eq!(
            store.asset_state(&slug, "assets/a.png").unwrap(),
            AssetState::Present { size: 3 }
        );
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn empty_site_exists_with_empty_manifest() {
        let store = MemorySiteStore::new().with_empty_site("demo");
        let slug = Slug::parse("demo").unwrap();
        assert!(store.exists(&slug));
        assert!(store.manifest(&slug).unwrap().is_empty());
    }

    #[test]
    fn nested_copy_replaces_top_level_entries() {
        let store = MemorySiteStore::new()
            .with_file("demo", "index.html", "old")
            .with_file("demo", "assets/stale.png", "x")
            .with_file("demo", "robots.txt", "keep")
            .with_file("demo", "sites/demo/index.html", "new")
            .with_file("demo", "sites/demo/assets/hero.png", "");
        let slug = Slug::parse("demo").unwrap();

        assert!(store.normalize_layout(&slug).unwrap());
        assert_eq!(store.read("demo", "index.html").unwrap(), b"new");
        assert_eq!(store.read("demo", "assets/hero.png").unwrap(), b"");
        assert!(store.read("demo", "assets/stale.png").is_none());
        assert_eq!(store.read("demo", "robots.txt").unwrap(), b"keep");
        assert!(!store.normalize_layout(&slug).unwrap());
    }

    #[test]
    fn rejects_escaping_paths() {
        let store = MemorySiteStore::new();
        let slug = Slug::parse("demo").unwrap();
        assert!(store.write_asset_atomic(&slug, "../x.png", b"x").is_err());
        assert!(store.read_text(&slug, "/etc/passwd").is_err());
    }
}
