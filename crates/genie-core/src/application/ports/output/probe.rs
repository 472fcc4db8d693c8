use async_trait::async_trait;

/// Checks whether a hostname serves the deployed site yet.
///
/// Implemented by `genie_adapters::probe::HttpSiteProbe`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SiteProbe: Send + Sync {
    /// `true` once `https://{fqdn}/` answers with a success status.
    async fn is_serving(&self, fqdn: &str) -> bool;
}
