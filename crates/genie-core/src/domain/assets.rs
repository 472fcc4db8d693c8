//! Image placeholders discovered in a site's markup.
//!
//! Scanning is a pure derivation from the HTML documents of a manifest: no
//! filesystem or network access happens here.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

// ── ResolutionTier ───────────────────────────────────────────────────────────

/// Coarse size class requested from the image provider.
///
/// Only used to pick a size hint and to estimate cost; the provider chooses
/// the actual pixel dimensions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum ResolutionTier {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ResolutionTier {
    pub const ALL: [ResolutionTier; 3] = [Self::OneK, Self::TwoK, Self::FourK];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionTier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1K" | "1024" => Ok(Self::OneK),
            "2K" | "2048" => Ok(Self::TwoK),
            "4K" | "4096" => Ok(Self::FourK),
            _ => Err(DomainError::UnknownResolutionTier(s.to_string())),
        }
    }
}

// ── AssetSlot ────────────────────────────────────────────────────────────────

/// One image the markup expects to find on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSlot {
    /// Path relative to the site directory, e.g. `assets/hero.png`.
    pub src: String,
    pub alt_hint: String,
    pub resolution_tier: ResolutionTier,
}

impl AssetSlot {
    pub fn is_hero(&self) -> bool {
        self.src.to_ascii_lowercase().contains("hero")
    }

    /// Prompt sent to the image provider for this slot.
    pub fn prompt(&self, product_context: Option<&str>) -> String {
        let detail = if self.alt_hint.is_empty() {
            format!("{} for the product landing page", self.name_hint())
        } else {
            self.alt_hint.clone()
        };

        let mut parts = vec![
            detail,
            "Marketing-ready illustration, no text overlays, keep backgrounds clean.".to_string(),
        ];
        if let Some(context) = product_context.map(str::trim).filter(|c| !c.is_empty()) {
            parts.push(format!("Product context: {context}"));
        }
        if self.is_hero() {
            parts.push("Wide 16:9 composition suitable for a hero banner.".into());
        } else {
            parts.push("Cohesive color palette to match the page styling.".into());
        }
        parts.join(" ")
    }

    /// File stem with separators turned into spaces: `feature-1.png` → `feature 1`.
    fn name_hint(&self) -> String {
        let file = self.src.rsplit('/').next().unwrap_or(&self.src);
        let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
        stem.replace(['-', '_'], " ")
    }
}

/// What currently sits at a slot's target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Missing,
    /// A zero-byte file left behind by the page generator.
    Placeholder,
    Present { size: u64 },
}

impl AssetState {
    pub fn from_size(size: Option<u64>) -> Self {
        match size {
            None => Self::Missing,
            Some(0) => Self::Placeholder,
            Some(size) => Self::Present { size },
        }
    }

    /// Whether a job must be created for this slot.
    pub fn needs_generation(&self, overwrite: bool) -> bool {
        overwrite || !matches!(self, Self::Present { .. })
    }
}

// ── Scanning ─────────────────────────────────────────────────────────────────

/// Options controlling how `<img>` tags become slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRules {
    /// Directory (relative to the site root) that holds generated images.
    pub assets_dir: String,
    pub default_tier: ResolutionTier,
    pub hero_tier: ResolutionTier,
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            assets_dir: "assets".into(),
            default_tier: ResolutionTier::OneK,
            hero_tier: ResolutionTier::TwoK,
        }
    }
}

/// Result of scanning a set of documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub slots: Vec<AssetSlot>,
    /// Image references that were found but rejected.
    pub ignored: Vec<DomainError>,
}

/// Collect asset slots from `(document path, html)` pairs.
///
/// Slots are unique by `src`; the first occurrence (in document order, then
/// tag order) wins.
pub fn scan_documents<'a, I>(documents: I, rules: &ScanRules) -> ScanResult
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut result = ScanResult::default();
    let mut seen = HashSet::new();

    for (doc_path, html) in documents {
        let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
            tracing::debug!(document = doc_path, "Skipping unparsable document");
            continue;
        };
        let parser = dom.parser();
        let Some(images) = dom.query_selector("img") else {
            continue;
        };

        for handle in images {
            let Some(tag) = handle.get(parser).and_then(|n| n.as_tag()) else {
                continue;
            };
            let Some(raw_src) = attr(tag, "src").filter(|s| !s.is_empty()) else {
                continue;
            };
            if is_external(&raw_src) {
                continue;
            }

            let src = match resolve_src(doc_path, &raw_src, &rules.assets_dir) {
                Ok(Some(src)) => src,
                Ok(None) => continue,
                Err(e) => {
                    result.ignored.push(e);
                    continue;
                }
            };
            if !seen.insert(src.clone()) {
                continue;
            }

            let alt_hint = attr(tag, "alt").unwrap_or_default();
            let explicit_tier = attr(tag, "data-resolution").and_then(|t| t.parse().ok());
            let mut slot = AssetSlot {
                src,
                alt_hint,
                resolution_tier: rules.default_tier,
            };
            slot.resolution_tier = explicit_tier.unwrap_or(if slot.is_hero() {
                rules.hero_tier
            } else {
                rules.default_tier
            });
            result.slots.push(slot);
        }
    }

    result
}

fn attr(tag: &tl::HTMLTag<'_>, name: &'static str) -> Option<String> {
    tag.attributes()
        .get(name)
        .flatten()
        .map(|v| v.as_utf8_str().trim().to_string())
}

fn is_external(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    lower.starts_with("//") || lower.starts_with("data:") || lower.contains("://")
}

/// Resolve `raw` against the directory of `doc_path` into a site-relative path.
///
/// Returns `Ok(None)` for images outside the assets directory (left alone) and
/// an error for references that escape the site root.
fn resolve_src(doc_path: &str, raw: &str, assets_dir: &str) -> Result<Option<String>, DomainError> {
    let cleaned = raw.split(['?', '#']).next().unwrap_or_default();

    let mut parts: Vec<&str> = if cleaned.starts_with('/') {
        Vec::new()
    } else {
        let mut dir: Vec<&str> = doc_path.split('/').collect();
        dir.pop();
        dir
    };

    for segment in cleaned.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(DomainError::InvalidAssetPath {
                        path: raw.to_string(),
                        reason: "path escapes the site directory".into(),
                    });
                }
            }
            other => parts.push(other),
        }
    }

    let assets_dir = assets_dir.trim_matches('/');
    let resolved = parts.join("/");
    let inside_assets = resolved
        .strip_prefix(assets_dir)
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1);

    Ok(inside_assets.then_some(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(html: &str) -> ScanResult {
        scan_documents([("index.html", html)], &ScanRules::default())
    }

    #[test]
    fn tier_parsing_and_ordering() {
        assert_eq!("2k".parse::<ResolutionTier>().unwrap(), ResolutionTier::TwoK);
        assert_eq!("4096".parse::<ResolutionTier>().unwrap(), ResolutionTier::FourK);
        assert!("8K".parse::<ResolutionTier>().is_err());
        assert!(ResolutionTier::OneK < ResolutionTier::TwoK);
        assert!(ResolutionTier::TwoK < ResolutionTier::FourK);
    }

    #[test]
    fn finds_asset_images_in_document_order() {
        let result = scan(
            r#"<html><body>
                <img src="assets/hero.png" alt="Sunrise over a desk">
                <img src="assets/feature-1.png">
                <img src="https://cdn.example.com/logo.png" alt="logo">
                <img src="img/other.png" alt="not ours">
            </body></html>"#,
        );
        let srcs: Vec<_> = result.slots.iter().map(|s| s.src.as_str()).collect();
        assert_eq!(srcs, ["assets/hero.png", "assets/feature-1.png"]);
        assert_eq!(result.slots[0].alt_hint, "Sunrise over a desk");
        assert_eq!(result.slots[0].resolution_tier, ResolutionTier::TwoK);
        assert_eq!(result.slots[1].resolution_tier, ResolutionTier::OneK);
        assert!(result.ignored.is_empty());
    }

    #[test]
    fn duplicate_sources_keep_first_occurrence() {
        let result = scan(
            r#"<img src="assets/a.png" alt="first"><img src="./assets/a.png" alt="second">"#,
        );
        assert_eq!(result.slots.len(), 1);
        assert_eq!(result.slots[0].alt_hint, "first");
    }

    #[test]
    fn explicit_resolution_attribute_wins() {
        let result = scan(r#"<img src="assets/hero.png" data-resolution="4K">"#);
        assert_eq!(result.slots[0].resolution_tier, ResolutionTier::FourK);
    }

    #[test]
    fn nested_documents_resolve_relative_paths() {
        let result = scan_documents(
            [("blog/post.html", r#"<img src="../assets/post.png"><img src="/assets/root.png">"#)],
            &ScanRules::default(),
        );
        let srcs: Vec<_> = result.slots.iter().map(|s| s.src.as_str()).collect();
        assert_eq!(srcs, ["assets/post.png", "assets/root.png"]);
    }

    #[test]
    fn escaping_paths_are_reported_not_used() {
        let result = scan(r#"<img src="../../etc/passwd"><img src="assets/ok.png?v=2">"#);
        assert_eq!(result.slots.len(), 1);
        assert_eq!(result.slots[0].src, "assets/ok.png");
        assert_eq!(result.ignored.len(), 1);
    }

    #[test]
    fn prompt_uses_alt_context_and_hero_hint() {
        let slot = AssetSlot {
            src: "assets/hero.png".into(),
            alt_hint: "Team celebrating".into(),
            resolution_tier: ResolutionTier::TwoK,
        };
        let prompt = slot.prompt(Some("  habit tracker for teams "));
        assert!(prompt.starts_with("Team celebrating Marketing-ready illustration"));
        assert!(prompt.contains("Product context: habit tracker for teams"));
        assert!(prompt.ends_with("Wide 16:9 composition suitable for a hero banner."));
    }

    #[test]
    fn prompt_falls_back_to_file_name() {
        let slot = AssetSlot {
            src: "assets/feature_one-b.webp".into(),
            alt_hint: String::new(),
            resolution_tier: ResolutionTier::OneK,
        };
        let prompt = slot.prompt(None);
        assert!(prompt.starts_with("feature one b for the product landing page"));
        assert!(prompt.ends_with("Cohesive color palette to match the page styling."));
        assert!(!prompt.contains("Product context"));
    }

    #[test]
    fn asset_state_decides_generation() {
        assert!(AssetState::Missing.needs_generation(false));
        assert!(AssetState::Placeholder.needs_generation(false));
        assert!(!AssetState::Present { size: 10 }.needs_generation(false));
        assert!(AssetState::Present { size: 10 }.needs_generation(true));
        assert_eq!(AssetState::from_size(Some(0)), AssetState::Placeholder);
    }
}
