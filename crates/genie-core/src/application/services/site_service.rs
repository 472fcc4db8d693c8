//! Site Service - read-only views of the local sites directory.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use crate::{
    application::ports::SiteStore,
    domain::{ResourceNames, RootDomain, Slug, resolve_validated},
    error::GenieResult,
};

/// One row of `landing-genie list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteSummary {
    pub slug: Slug,
    pub files: usize,
    pub html_files: usize,
    pub bytes: u64,
    /// Names the site would deploy under, when a root domain is known.
    pub names: Option<ResourceNames>,
}

pub struct SiteService {
    sites: Arc<dyn SiteStore>,
}

impl SiteService {
    pub fn new(sites: Arc<dyn SiteStore>) -> Self {
        Self { sites }
    }

    /// Summaries of every site, sorted by slug.
    #[instrument(skip_all)]
    pub fn list(&self, root: Option<&RootDomain>) -> GenieResult<Vec<SiteSummary>> {
        self.sites
            .list_sites()?
            .into_iter()
            .map(|slug| {
                let manifest = self.sites.manifest(&slug)?;
                Ok(SiteSummary {
                    files: manifest.len(),
                    html_files: manifest.html_files().count(),
                    bytes: manifest.total_bytes(),
                    names: root.map(|root| resolve_validated(&slug, root)),
                    slug,
                })
            })
            .collect()
    }
}
