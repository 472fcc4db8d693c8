use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::naming::Slug;

/// Content fingerprint in `sha256:<hex>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("sha256:{:x}", Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One file of a site, addressed by its `/`-separated path relative to the
/// site directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub fingerprint: Fingerprint,
    pub size: u64,
}

impl ManifestEntry {
    pub fn new(path: impl Into<String>, content: &[u8]) -> Self {
        Self {
            path: path.into(),
            fingerprint: Fingerprint::of(content),
            size: content.len() as u64,
        }
    }

    pub fn is_html(&self) -> bool {
        let lower = self.path.to_ascii_lowercase();
        lower.ends_with(".html") || lower.ends_with(".htm")
    }
}

/// Derived listing of a site's files. Entries are always sorted by path so
/// two manifests of the same tree compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteManifest {
    pub slug: Slug,
    entries: Vec<ManifestEntry>,
}

impl SiteManifest {
    pub fn new(slug: Slug, mut entries: Vec<ManifestEntry>) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries.dedup_by(|a, b| a.path == b.path);
        Self { slug, entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn html_files(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(|e| e.is_html())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slug() -> Slug {
        Slug::parse("habitlab").unwrap()
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        let fp = Fingerprint::of(b"hello");
        assert_eq!(
            fp.as_str(),
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn entries_are_sorted_and_deduplicated() {
        let manifest = SiteManifest::new(
            slug(),
            vec![
                ManifestEntry::new("styles.css", b"body{}"),
                ManifestEntry::new("assets/hero.png", b"png"),
                ManifestEntry::new("index.html", b"<html>"),
                ManifestEntry::new("index.html", b"<html>"),
            ],
        );
        let paths: Vec<_> = manifest.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["assets/hero.png", "index.html", "styles.css"]);
        assert_eq!(manifest.html_files().count(), 1);
        assert_eq!(manifest.total_bytes(), 3 + 6 + 6);
    }
}
