//! HTTP reachability check for deployed sites.

use std::time::Duration;

use async_trait::async_trait;
use genie_core::application::ports::SiteProbe;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpSiteProbe {
    http: reqwest::Client,
    scheme: &'static str,
}

impl HttpSiteProbe {
    pub fn new(request_timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("landing-genie/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            scheme: "https",
        })
    }

    /// Probe over plain HTTP.
    pub fn insecure(mut self) -> Self {
        self.scheme = "http";
        self
    }
}

#[async_trait]
impl SiteProbe for HttpSiteProbe {
    async fn is_serving(&self, fqdn: &str) -> bool {
        let url = format!("{}://{fqdn}/", self.scheme);
        match self.http.get(&url).send().await {
            Ok(response) => {
                debug!(%url, status = %response.status(), "Probe answered");
                response.status().is_success()
            }
            Err(e) => {
                debug!(%url, error = %e, "Probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_host_is_not_serving() {
        let probe = HttpSiteProbe::new(Duration::from_secs(2)).unwrap().insecure();
        assert!(!probe.is_serving("127.0.0.1:9").await);
    }
}
