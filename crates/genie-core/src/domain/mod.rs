// ============================================================================
//  CLEAN MODULE BOUNDARIES
// ============================================================================

//! Core domain layer for landing-genie.
//!
//! Pure logic only. Remote platforms, the filesystem and the image provider
//! are reached through ports defined in the application layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: Domain logic is synchronous
//! - **No I/O**: No filesystem, network, or external calls
//! - **Deterministic**: Names, plans and reconcile decisions are pure functions
//! - **Rich domain model**: Behavior lives in the types, not in services
//!
pub mod assets;
pub mod deployment;
pub mod dns;
pub mod error;
pub mod job;
pub mod manifest;
pub mod naming;
pub mod pricing;

// Re-exports for convenience
pub use assets::{
    AssetSlot, AssetState, ResolutionTier, ScanResult, ScanRules, scan_documents,
};
pub use deployment::{DeployStage, Deployment, DomainAttachment, PagesProject, SiteStatus};
pub use dns::{DesiredRecord, DnsRecord, OWNER_MARKER, RecordAction, RecordType, UpsertOutcome};
pub use error::{DomainError, ErrorCategory};
pub use job::{GenerationJob, JobFailure, JobStatus};
pub use manifest::{Fingerprint, ManifestEntry, SiteManifest};
pub use naming::{ResourceNames, RootDomain, Slug, resolve, resolve_validated};
pub use pricing::{CostEstimate, ESTIMATE_LABEL, PricingTable};

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Cross-module scenarios
    // ========================================================================

    #[test]
    fn deploy_target_record_points_at_project() {
        let names = resolve("habitlab", "example.com").unwrap();
        let desired = DesiredRecord::cname(&names.fqdn, names.pages_hostname());

        assert_eq!(desired.name, "habitlab.example.com");
        assert_eq!(desired.content, "lp-habitlab-example-com.pages.dev");
        assert!(desired.proxied);
        assert_eq!(desired.comment(), OWNER_MARKER);
    }

    #[test]
    fn scanned_slots_are_priced_by_tier() {
        let html = r#"<img src="assets/hero.png"><img src="assets/card.png">"#;
        let scan = scan_documents([("index.html", html)], &ScanRules::default());
        let table = PricingTable::default();

        let costs: Vec<f64> = scan
            .slots
            .iter()
            .map(|s| {
                table
                    .estimate("gemini-3-pro-image-preview", s.resolution_tier)
                    .unwrap()
                    .usd
            })
            .collect();
        assert_eq!(costs.len(), 2);
        assert!(costs[0] >= costs[1]);
    }

    #[test]
    fn manifest_feeds_scanner() {
        let manifest = SiteManifest::new(
            Slug::parse("habitlab").unwrap(),
            vec![
                ManifestEntry::new("index.html", b"<img src=\"assets/a.png\">"),
                ManifestEntry::new("assets/a.png", b""),
            ],
        );
        assert_eq!(manifest.html_files().count(), 1);
        assert_eq!(
            AssetState::from_size(manifest.get("assets/a.png").map(|e| e.size)),
            AssetState::Placeholder
        );
    }
}
