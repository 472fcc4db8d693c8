//! Deploy Service - reconciles one local site with its live subdomain.
//!
//! Stages run strictly in order:
//! 1. Resolve names, take the site lock, then repair and check the local site
//! 2. Ensure the Pages project exists
//! 3. Upload the site (retried with backoff)
//! 4. Check the DNS name is ours to take, attach the custom domain and upsert
//!    the DNS record
//! 5. Optionally poll until the hostname serves the site
//!
//! Every stage is idempotent, so re-running a failed deploy is the recovery
//! path. Nothing is rolled back.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::{
    application::{
        ApplicationError, DeployConfig, DeployFailure, DeployReport, DeployWarning,
        ports::{
            PlatformClient, PlatformError, ProgressSink, SiteLock, SiteProbe, SiteStore,
            UploadError, UploadErrorKind,
        },
        sync::acquire_or_cancel,
    },
    domain::{
        DeployStage, Deployment, DesiredRecord, DnsRecord, PagesProject, RecordAction,
        ResourceNames, SiteStatus, Slug, UpsertOutcome, resolve_validated,
    },
    error::GenieError,
};

/// Bookkeeping for one run: which stages were entered and what is known so far.
struct Run<'a> {
    id: Uuid,
    raw_slug: &'a str,
    stages: Vec<DeployStage>,
    names: Option<ResourceNames>,
    progress: &'a dyn ProgressSink,
}

impl<'a> Run<'a> {
    fn new(raw_slug: &'a str, progress: &'a dyn ProgressSink) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_slug,
            stages: Vec::with_capacity(DeployStage::ORDER.len()),
            names: None,
            progress,
        }
    }

    fn current(&self) -> DeployStage {
        self.stages.last().copied().unwrap_or(DeployStage::Resolving)
    }

    fn enter(&mut self, stage: DeployStage) {
        if let Some(previous) = self.stages.last() {
            self.progress.stage_finished(*previous);
        }
        debug!(stage = %stage, "Entering stage");
        self.stages.push(stage);
        self.progress.stage_started(stage);
    }

    fn fail(&self, error: impl Into<GenieError>) -> DeployFailure {
        let error = error.into();
        let stage = self.current();
        let retryable = error.is_retryable();
        warn!(stage = %stage, retryable, error = %error, "Deploy failed");
        DeployFailure {
            run_id: self.id,
            slug: self.raw_slug.to_string(),
            stage,
            error,
            retryable,
            names: self.names.clone(),
            stages: self.stages.clone(),
        }
    }
}

/// Deployment orchestrator.
pub struct DeployService {
    platform: Arc<dyn PlatformClient>,
    sites: Arc<dyn SiteStore>,
    locks: Arc<dyn SiteLock>,
    probe: Arc<dyn SiteProbe>,
    config: DeployConfig,
}

impl DeployService {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        sites: Arc<dyn SiteStore>,
        locks: Arc<dyn SiteLock>,
        probe: Arc<dyn SiteProbe>,
        config: DeployConfig,
    ) -> Self {
        Self {
            platform,
            sites,
            locks,
            probe,
            config,
        }
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Deploy the site `raw_slug`.
    ///
    /// Cancellation is observed between remote calls; a call already in
    /// flight is allowed to finish first.
    #[instrument(name = "deploy", skip_all, fields(slug = %raw_slug, run_id = tracing::field::Empty))]
    pub async fn deploy(
        &self,
        raw_slug: &str,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<DeployReport, DeployFailure> {
        let started_at = Utc::now();
        let mut run = Run::new(raw_slug, progress);
        tracing::Span::current().record("run_id", tracing::field::display(run.id));

        // 1. Resolving
        run.enter(DeployStage::Resolving);
        let slug = Slug::parse(raw_slug).map_err(|e| run.fail(e))?;
        let names = resolve_validated(&slug, &self.config.root_domain);
        run.names = Some(names.clone());
        info!(project = %names.project_name, fqdn = %names.fqdn, "Resolved resource names");

        let _guard = acquire_or_cancel(self.locks.as_ref(), &slug, cancel)
            .await
            .map_err(|e| run.fail(e))?;
        self.sites.normalize_layout(&slug).map_err(|e| run.fail(e))?;
        self.check_site(&slug).map_err(|e| run.fail(e))?;

        // 2. ProjectEnsuring
        run.enter(DeployStage::ProjectEnsuring);
        ensure_live(cancel).map_err(|e| run.fail(e))?;
        let (project, project_created) = self
            .ensure_project(&names.project_name)
            .instrument(info_span!("project_ensuring"))
            .await
            .map_err(|e| run.fail(e))?;

        // 3. Uploading
        run.enter(DeployStage::Uploading);
        let site_dir = self.sites.site_dir(&slug);
        let deployment = self
            .upload(&project.name, &site_dir, cancel)
            .instrument(info_span!("uploading"))
            .await
            .map_err(|e| run.fail(e))?;

        // 4. DomainReconciling
        run.enter(DeployStage::DomainReconciling);
        ensure_live(cancel).map_err(|e| run.fail(e))?;
        let desired = DesiredRecord::cname(&names.fqdn, &project.subdomain);
        // A foreign record must stop the run before the domain is attached.
        let existing = self
            .call(
                "get dns record",
                self.platform.get_dns_record(&names.zone, &names.fqdn),
            )
            .await
            .map_err(|e| run.fail(e))?;
        if let Some(existing) = &existing {
            if let RecordAction::Conflict = DnsRecord::reconcile(Some(existing), &desired) {
                return Err(run.fail(domain_conflict(&names.fqdn, existing)));
            }
        }

        let mut warnings = Vec::new();
        let domain = self
            .call(
                "attach domain",
                self.platform.attach_domain(&project.name, &names.fqdn),
            )
            .await
            .map_err(|e| run.fail(e))?;
        if !domain.is_active() {
            warnings.push(DeployWarning::DomainPending {
                fqdn: names.fqdn.clone(),
                status: domain.status.clone(),
            });
        }

        ensure_live(cancel).map_err(|e| run.fail(e))?;
        let dns = self
            .call(
                "upsert dns record",
                self.platform.upsert_dns_record(&names.zone, &desired),
            )
            .instrument(info_span!("domain_reconciling", fqdn = %names.fqdn))
            .await
            .map_err(|e| run.fail(e))?;
        if let UpsertOutcome::Conflict { existing } = &dns {
            return Err(run.fail(domain_conflict(&names.fqdn, existing)));
        }
        info!(outcome = dns.label(), "DNS record reconciled");

        // 5. Verifying
        if self.config.verification_enabled() {
            run.enter(DeployStage::Verifying);
            if let Some(warning) = self
                .verify(&names.fqdn, cancel)
                .instrument(info_span!("verifying"))
                .await
            {
                warn!(%warning, "Verification incomplete");
                warnings.push(warning);
            }
        }

        run.enter(DeployStage::Deployed);
        run.progress.stage_finished(DeployStage::Deployed);
        info!(url = %deployment.url, "Site deployed");

        Ok(DeployReport {
            run_id: run.id,
            slug,
            names,
            project_created,
            deployment,
            domain,
            dns,
            warnings,
            stages: run.stages,
            status: SiteStatus::Deployed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    // -------------------------------------------------------------------------
    // Stages
    // -------------------------------------------------------------------------

    fn check_site(&self, slug: &Slug) -> Result<(), GenieError> {
        if !self.sites.exists(slug) {
            return Err(ApplicationError::SiteNotFound {
                slug: slug.to_string(),
                path: self.sites.site_dir(slug),
            }
            .into());
        }
        let manifest = self.sites.manifest(slug)?;
        if manifest.is_empty() {
            return Err(ApplicationError::EmptySite {
                slug: slug.to_string(),
            }
            .into());
        }
        debug!(files = manifest.len(), bytes = manifest.total_bytes(), "Site manifest built");
        Ok(())
    }

    /// Get-or-create. Returns the project and whether this call created it.
    async fn ensure_project(&self, name: &str) -> Result<(PagesProject, bool), PlatformError> {
        if let Some(project) = self.call("get project", self.platform.get_project(name)).await? {
            info!(project = name, "Project exists");
            return Ok((project, false));
        }
        let project = self
            .call("create project", self.platform.create_project(name))
            .await?;
        info!(project = name, "Project created");
        Ok((project, true))
    }

    async fn upload(
        &self,
        project: &str,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Deployment, GenieError> {
        let policy = self.config.upload_retry();
        let mut attempt = 0;

        loop {
            ensure_live(cancel)?;
            attempt += 1;

            let result = match tokio::time::timeout(
                self.config.upload_timeout,
                self.platform.upload_deployment(project, dir),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(UploadError::new(
                    UploadErrorKind::Timeout,
                    format!(
                        "attempt {attempt} exceeded {}s",
                        self.config.upload_timeout.as_secs()
                    ),
                )),
            };

            match result {
                Ok(deployment) => {
                    info!(attempt, deployment_id = %deployment.id, "Upload complete");
                    return Ok(deployment);
                }
                Err(e) if e.is_transient() && policy.has_attempts_left(attempt) => {
                    let delay = policy.delay_after(attempt);
                    warn!(
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Upload failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ApplicationError::Cancelled.into()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Poll until the hostname serves or the window closes. Only a timeout
    /// produces a warning.
    async fn verify(&self, fqdn: &str, cancel: &CancellationToken) -> Option<DeployWarning> {
        let window = self.config.verify_timeout;
        let deadline = Instant::now() + window;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let serving = tokio::time::timeout(remaining, self.probe.is_serving(fqdn))
                .await
                .unwrap_or(false);
            if serving {
                info!(fqdn, "Site is serving");
                return None;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Some(DeployWarning::VerificationTimeout {
                    fqdn: fqdn.to_string(),
                    waited_secs: window.as_secs(),
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Verification skipped after cancellation");
                    return None;
                }
                _ = tokio::time::sleep(self.config.verify_interval.min(remaining)) => {}
            }
        }
    }

    /// Run a platform call under the configured timeout.
    async fn call<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = Result<T, PlatformError>>,
    ) -> Result<T, PlatformError> {
        match tokio::time::timeout(self.config.platform_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::transport(format!(
                "{what} timed out after {}s",
                self.config.platform_timeout.as_secs()
            ))),
        }
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), ApplicationError> {
    if cancel.is_cancelled() {
        return Err(ApplicationError::Cancelled);
    }
    Ok(())
}

fn domain_conflict(fqdn: &str, existing: &DnsRecord) -> ApplicationError {
    ApplicationError::DomainConflict {
        fqdn: fqdn.to_string(),
        record_type: existing.record_type,
        content: existing.content.clone(),
    }
}
