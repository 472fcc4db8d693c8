//! Deployment stages and the remote resources a deployment touches.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stages of one deploy run, executed strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    Resolving,
    ProjectEnsuring,
    Uploading,
    DomainReconciling,
    Verifying,
    Deployed,
}

impl DeployStage {
    pub const ORDER: [DeployStage; 6] = [
        Self::Resolving,
        Self::ProjectEnsuring,
        Self::Uploading,
        Self::DomainReconciling,
        Self::Verifying,
        Self::Deployed,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::ProjectEnsuring => "project_ensuring",
            Self::Uploading => "uploading",
            Self::DomainReconciling => "domain_reconciling",
            Self::Verifying => "verifying",
            Self::Deployed => "deployed",
        }
    }

    /// The stage that follows this one, `None` once deployed.
    pub fn next(&self) -> Option<Self> {
        let idx = Self::ORDER.iter().position(|s| s == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    /// Step number shown in progress output (1-based, `Deployed` excluded).
    pub fn step(&self) -> usize {
        Self::ORDER.iter().position(|s| s == self).map_or(0, |i| i + 1)
    }

    pub const STEPS: usize = 5;
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a site from this tool's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    #[default]
    Draft,
    Deployed,
    DeployFailed,
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Draft => "draft",
            Self::Deployed => "deployed",
            Self::DeployFailed => "deploy_failed",
        })
    }
}

/// A Pages project as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagesProject {
    pub name: String,
    /// `<name>.pages.dev`
    pub subdomain: String,
    pub latest_deployment_id: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,
}

impl PagesProject {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            subdomain: format!("{name}.pages.dev"),
            name,
            latest_deployment_id: None,
            domains: Vec::new(),
        }
    }

    pub fn has_domain(&self, fqdn: &str) -> bool {
        self.domains.iter().any(|d| d.eq_ignore_ascii_case(fqdn))
    }
}

/// One uploaded build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub url: String,
}

/// State of a custom domain on a Pages project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainAttachment {
    pub name: String,
    /// Platform status string, e.g. `active` or `pending`.
    pub status: String,
    /// `true` if this call registered the domain.
    pub newly_attached: bool,
}

impl DomainAttachment {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order() {
        let mut stage = DeployStage::Resolving;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen, DeployStage::ORDER);
        assert_eq!(DeployStage::Verifying.step(), DeployStage::STEPS);
    }

    #[test]
    fn project_subdomain_follows_name() {
        let mut project = PagesProject::new("lp-habitlab-example-com");
        assert_eq!(project.subdomain, "lp-habitlab-example-com.pages.dev");
        project.domains.push("Habitlab.example.com".into());
        assert!(project.has_domain("habitlab.example.com"));
    }
}
