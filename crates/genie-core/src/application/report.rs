//! Results of deploy and image runs.
//!
//! Reports are keyed by stable identifiers (stage order, slot `src`), never by
//! completion order, so two runs with the same outcome render identically.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    CostEstimate, DeployStage, Deployment, DomainAttachment, ESTIMATE_LABEL, JobFailure,
    ResolutionTier, ResourceNames, SiteStatus, Slug, UpsertOutcome,
};
use crate::error::GenieError;

// ── Deploy ───────────────────────────────────────────────────────────────────

/// Soft failures: the site is deployed, but something needs a look.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeployWarning {
    /// The hostname did not serve the site within the verification window.
    VerificationTimeout { fqdn: String, waited_secs: u64 },
    /// The custom domain is attached but the platform has not activated it.
    DomainPending { fqdn: String, status: String },
}

impl std::fmt::Display for DeployWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VerificationTimeout { fqdn, waited_secs } => write!(
                f,
                "{fqdn} did not respond within {waited_secs}s; DNS may still be propagating"
            ),
            Self::DomainPending { fqdn, status } => {
                write!(f, "custom domain {fqdn} is {status} on the Pages project")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployReport {
    pub run_id: Uuid,
    pub slug: Slug,
    pub names: ResourceNames,
    pub project_created: bool,
    pub deployment: Deployment,
    pub domain: DomainAttachment,
    pub dns: UpsertOutcome,
    pub warnings: Vec<DeployWarning>,
    /// Stages visited, in order.
    pub stages: Vec<DeployStage>,
    pub status: SiteStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DeployReport {
    pub fn live_url(&self) -> String {
        format!("https://{}", self.names.fqdn)
    }
}

/// A deploy that stopped before `Deployed`.
#[derive(Debug, Clone, Error)]
#[error("deploy of '{slug}' failed during {stage}: {error}")]
pub struct DeployFailure {
    pub run_id: Uuid,
    /// Raw slug as given; it may be invalid.
    pub slug: String,
    pub stage: DeployStage,
    #[source]
    pub error: GenieError,
    /// Whether re-running the same command may succeed without changes.
    pub retryable: bool,
    pub names: Option<ResourceNames>,
    pub stages: Vec<DeployStage>,
}

impl DeployFailure {
    pub fn status(&self) -> SiteStatus {
        SiteStatus::DeployFailed
    }
}

// ── Images ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SlotOutcome {
    Generated { bytes: u64 },
    /// An image already exists and overwrite was off.
    Skipped { size: u64 },
    Failed { reason: JobFailure },
    /// Dry run: a job would be created.
    Planned,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotReport {
    pub tier: ResolutionTier,
    pub outcome: SlotOutcome,
    pub estimated_cost: Option<CostEstimate>,
    pub attempts: u32,
}

impl SlotReport {
    fn counts_toward_cost(&self) -> bool {
        matches!(
            self.outcome,
            SlotOutcome::Generated { .. } | SlotOutcome::Planned
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagesReport {
    pub run_id: Uuid,
    pub slug: Slug,
    pub model: String,
    pub dry_run: bool,
    /// One entry per slot, keyed by `src`.
    pub slots: BTreeMap<String, SlotReport>,
    /// Image references that were found but not usable.
    pub ignored: Vec<String>,
    pub quota_exhausted: bool,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImagesSummary {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub planned: usize,
    pub estimated_cost_usd: f64,
    /// Slots whose model had no price; they are left out of the total.
    pub unpriced: usize,
    pub cost_label: &'static str,
}

impl ImagesReport {
    pub fn count(&self, pred: impl Fn(&SlotOutcome) -> bool) -> usize {
        self.slots.values().filter(|s| pred(&s.outcome)).count()
    }

    pub fn generated(&self) -> usize {
        self.count(|o| matches!(o, SlotOutcome::Generated { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SlotOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SlotOutcome::Failed { .. }))
    }

    /// Sum of estimates for generated (or, in a dry run, planned) slots.
    pub fn estimated_cost_usd(&self) -> f64 {
        self.slots
            .values()
            .filter(|s| s.counts_toward_cost())
            .filter_map(|s| s.estimated_cost.map(|c| c.usd))
            .sum()
    }

    pub fn summary(&self) -> ImagesSummary {
        ImagesSummary {
            generated: self.generated(),
            skipped: self.skipped(),
            failed: self.failed(),
            planned: self.count(|o| matches!(o, SlotOutcome::Planned)),
            estimated_cost_usd: self.estimated_cost_usd(),
            unpriced: self
                .slots
                .values()
                .filter(|s| s.counts_toward_cost() && s.estimated_cost.is_none())
                .count(),
            cost_label: ESTIMATE_LABEL,
        }
    }

    /// Failed slots with their reasons, in `src` order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &JobFailure)> {
        self.slots.iter().filter_map(|(src, slot)| match &slot.outcome {
            SlotOutcome::Failed { reason } => Some((src.as_str(), reason)),
            _ => None,
        })
    }
}
