//! Asset Pipeline - fills a site's image placeholders.
//!
//! 1. Scan the site's HTML for `<img>` references under the assets directory
//! 2. Skip slots that already have an image (unless overwriting)
//! 3. Generate the rest on a bounded worker pool under a shared rate budget
//! 4. Write each image atomically as soon as it arrives
//!
//! Job failures never abort sibling jobs, including failures of the job's own
//! machinery (rate budget, worker task): those fail only that slot. A
//! quota-exhaustion signal stops new jobs from starting; jobs already running
//! finish normally.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    application::{
        ApplicationError, ImagesReport, PipelineConfig, SlotOutcome, SlotReport,
        ports::{ImageProvider, ProgressSink, ProviderError, RateLimiter, SiteLock, SiteStore},
        retry::RetryPolicy,
        sync::acquire_or_cancel,
    },
    domain::{
        AssetSlot, AssetState, GenerationJob, JobFailure, JobStatus, Slug, scan_documents,
    },
    error::{Context, GenieResult},
};

/// Input of one `images` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagesRequest {
    /// Raw slug as typed by the user.
    pub slug: String,
    pub overwrite: bool,
    /// Extra product description appended to every prompt.
    pub product_context: Option<String>,
}

/// Slots found on disk, with what currently sits at each path.
struct Inventory {
    slug: Slug,
    slots: Vec<(AssetSlot, AssetState)>,
    ignored: Vec<String>,
}

/// Everything a worker task needs, shared across the pool.
struct Worker {
    slug: Slug,
    provider: Arc<dyn ImageProvider>,
    sites: Arc<dyn SiteStore>,
    limiter: Arc<dyn RateLimiter>,
    permits: Arc<Semaphore>,
    policy: RetryPolicy,
    request_timeout: std::time::Duration,
    quota_exhausted: AtomicBool,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressSink>,
}

pub struct AssetPipeline {
    provider: Arc<dyn ImageProvider>,
    sites: Arc<dyn SiteStore>,
    locks: Arc<dyn SiteLock>,
    limiter: Arc<dyn RateLimiter>,
    config: PipelineConfig,
}

impl AssetPipeline {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        sites: Arc<dyn SiteStore>,
        locks: Arc<dyn SiteLock>,
        limiter: Arc<dyn RateLimiter>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            sites,
            locks,
            limiter,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generate every slot that needs an image.
    ///
    /// Returns an error only for problems found before any job starts
    /// (unknown site, unreadable files, cancelled while waiting for the site
    /// lock). Once jobs are running every failure lands in the report.
    #[instrument(name = "images", skip_all, fields(slug = %request.slug, overwrite = request.overwrite))]
    pub async fn run(
        &self,
        request: &ImagesRequest,
        cancel: &CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> GenieResult<ImagesReport> {
        let started_at = Utc::now();
        let slug = Slug::parse(&request.slug)?;
        let _guard = acquire_or_cancel(self.locks.as_ref(), &slug, cancel).await?;
        self.sites.normalize_layout(&slug)?;
        let inventory = self.inventory(slug)?;
        let model = self.provider.model();

        let mut slots = BTreeMap::new();
        let mut jobs = Vec::new();
        for (slot, state) in inventory.slots {
            if let (false, AssetState::Present { size }) =
                (state.needs_generation(request.overwrite), state)
            {
                debug!(src = %slot.src, size, "Skipping existing image");
                slots.insert(
                    slot.src.clone(),
                    SlotReport {
                        tier: slot.resolution_tier,
                        outcome: SlotOutcome::Skipped { size },
                        estimated_cost: None,
                        attempts: 0,
                    },
                );
                continue;
            }
            let prompt = slot.prompt(request.product_context.as_deref());
            let estimate = self.config.pricing.estimate(&model, slot.resolution_tier);
            jobs.push(GenerationJob::new(slot, prompt, estimate));
        }

        info!(
            jobs = jobs.len(),
            skipped = slots.len(),
            workers = self.config.workers,
            model = %model,
            "Starting image generation"
        );
        progress.jobs_planned(jobs.len());

        let worker = Arc::new(Worker {
            slug: inventory.slug.clone(),
            provider: Arc::clone(&self.provider),
            sites: Arc::clone(&self.sites),
            limiter: Arc::clone(&self.limiter),
            permits: Arc::new(Semaphore::new(self.config.workers.max(1))),
            policy: self.config.generation_retry(),
            request_timeout: self.config.request_timeout,
            quota_exhausted: AtomicBool::new(false),
            cancel: cancel.clone(),
            progress,
        });

        // Slots whose worker never reports back (panic, abort) keep this entry.
        let mut unreported = BTreeMap::new();
        let mut pool = JoinSet::new();
        for job in jobs {
            unreported.insert(
                job.slot.src.clone(),
                SlotReport {
                    tier: job.slot.resolution_tier,
                    outcome: SlotOutcome::Failed {
                        reason: JobFailure::Internal {
                            message: "generation worker stopped unexpectedly".into(),
                        },
                    },
                    estimated_cost: job.estimated_cost,
                    attempts: 0,
                },
            );
            pool.spawn(Arc::clone(&worker).execute(job));
        }

        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(job) => {
                    unreported.remove(&job.slot.src);
                    slots.insert(job.slot.src.clone(), slot_report(&job));
                }
                Err(e) => warn!(error = %e, "Generation worker stopped unexpectedly"),
            }
        }
        for (src, report) in unreported {
            if let SlotOutcome::Failed { reason } = &report.outcome {
                worker.progress.job_finished(&src, &JobStatus::Failed { reason: reason.clone() });
            }
            slots.insert(src, report);
        }

        let report = ImagesReport {
            run_id: Uuid::new_v4(),
            slug: inventory.slug,
            model,
            dry_run: false,
            slots,
            ignored: inventory.ignored,
            quota_exhausted: worker.quota_exhausted.load(Ordering::SeqCst),
            cancelled: cancel.is_cancelled(),
            started_at,
            finished_at: Utc::now(),
        };
        let summary = report.summary();
        info!(
            generated = summary.generated,
            skipped = summary.skipped,
            failed = summary.failed,
            estimated_cost_usd = summary.estimated_cost_usd,
            "Image generation finished"
        );
        Ok(report)
    }

    /// Dry run: what `run` would do, with cost estimates. No provider calls
    /// and no images written; a nested output directory is still flattened.
    #[instrument(skip_all, fields(slug = %request.slug))]
    pub async fn plan(
        &self,
        request: &ImagesRequest,
        cancel: &CancellationToken,
    ) -> GenieResult<ImagesReport> {
        let started_at = Utc::now();
        let slug = Slug::parse(&request.slug)?;
        let _guard = acquire_or_cancel(self.locks.as_ref(), &slug, cancel).await?;
        self.sites.normalize_layout(&slug)?;
        let inventory = self.inventory(slug)?;
        let model = self.provider.model();

        let slots = inventory
            .slots
            .into_iter()
            .map(|(slot, state)| {
                let (outcome, estimated_cost) = match state {
                    AssetState::Present { size } if !request.overwrite => {
                        (SlotOutcome::Skipped { size }, None)
                    }
                    _ => (
                        SlotOutcome::Planned,
                        self.config.pricing.estimate(&model, slot.resolution_tier),
                    ),
                };
                let report = SlotReport {
                    tier: slot.resolution_tier,
                    outcome,
                    estimated_cost,
                    attempts: 0,
                };
                (slot.src, report)
            })
            .collect();

        Ok(ImagesReport {
            run_id: Uuid::new_v4(),
            slug: inventory.slug,
            model,
            dry_run: true,
            slots,
            ignored: inventory.ignored,
            quota_exhausted: false,
            cancelled: false,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn inventory(&self, slug: Slug) -> GenieResult<Inventory> {
        if !self.sites.exists(&slug) {
            return Err(ApplicationError::SiteNotFound {
                path: self.sites.site_dir(&slug),
                slug: slug.to_string(),
            }
            .into());
        }

        let manifest = self.sites.manifest(&slug)?;
        let mut documents = Vec::new();
        for entry in manifest.html_files() {
            documents.push((entry.path.clone(), self.sites.read_text(&slug, &entry.path)?));
        }

        let scan = scan_documents(
            documents.iter().map(|(p, html)| (p.as_str(), html.as_str())),
            &self.config.scan,
        );
        for ignored in &scan.ignored {
            warn!(reason = %ignored, "Ignoring image reference");
        }

        let mut slots = Vec::with_capacity(scan.slots.len());
        for slot in scan.slots {
            let state = self.sites.asset_state(&slug, &slot.src)?;
            slots.push((slot, state));
        }

        Ok(Inventory {
            slug,
            slots,
            ignored: scan.ignored.iter().map(ToString::to_string).collect(),
        })
    }
}

fn slot_report(job: &GenerationJob) -> SlotReport {
    let outcome = match job.status() {
        JobStatus::Succeeded => SlotOutcome::Generated {
            bytes: job.output_bytes().map_or(0, |b| b.len() as u64),
        },
        JobStatus::Failed { reason } => SlotOutcome::Failed {
            reason: reason.clone(),
        },
        other => SlotOutcome::Failed {
            reason: JobFailure::Internal {
                message: format!("job ended while {}", other.name()),
            },
        },
    };
    SlotReport {
        tier: job.slot.resolution_tier,
        outcome,
        estimated_cost: job.estimated_cost,
        attempts: job.attempts(),
    }
}

impl Worker {
    /// Drive one job to a terminal state. Errors from the job's machinery
    /// fail this job only.
    async fn execute(self: Arc<Self>, mut job: GenerationJob) -> GenerationJob {
        if let Err(e) = self.drive(&mut job).await {
            warn!(src = %job.slot.src, error = %e, "Image job aborted");
            // Pending and Running both accept Failed.
            if !job.status().is_terminal() {
                let _ = job.fail(JobFailure::Internal {
                    message: e.to_string(),
                });
            }
        }
        self.progress.job_finished(&job.slot.src, job.status());
        job
    }

    async fn drive(&self, job: &mut GenerationJob) -> GenieResult<()> {
        let permit = tokio::select! {
            _ = self.cancel.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            job.fail(JobFailure::Cancelled)?;
            return Ok(());
        };

        if let Some(reason) = self.wait_for_budget().await? {
            debug!(src = %job.slot.src, reason = %reason, "Job not started");
            job.fail(reason)?;
            return Ok(());
        }

        job.start()?;
        self.progress.job_started(&job.slot.src);

        match self.generate(job).await? {
            Ok(bytes) => {
                let size = bytes.len();
                match self.write(&job.slot.src, bytes).await? {
                    Ok(bytes) => {
                        job.record_output(bytes)?;
                        job.succeed()?;
                        info!(src = %job.slot.src, size, attempts = job.attempts(), "Image written");
                    }
                    Err(e) => {
                        warn!(src = %job.slot.src, error = %e, "Could not write image");
                        job.fail(JobFailure::Storage {
                            message: e.to_string(),
                        })?;
                    }
                }
            }
            Err(reason) => {
                warn!(src = %job.slot.src, reason = %reason, "Image generation failed");
                job.fail(reason)?;
            }
        }
        Ok(())
    }

    /// `Some(reason)` if the job must not start.
    async fn wait_for_budget(&self) -> GenieResult<Option<JobFailure>> {
        if let Some(reason) = self.stop_reason() {
            return Ok(Some(reason));
        }
        tokio::select! {
            _ = self.cancel.cancelled() => return Ok(Some(JobFailure::Cancelled)),
            acquired = self.limiter.acquire() => acquired?,
        }
        Ok(self.stop_reason())
    }

    fn stop_reason(&self) -> Option<JobFailure> {
        if self.quota_exhausted.load(Ordering::SeqCst) {
            Some(JobFailure::QuotaExhausted)
        } else if self.cancel.is_cancelled() {
            Some(JobFailure::Cancelled)
        } else {
            None
        }
    }

    /// Call the provider until success, a permanent error or the attempt
    /// budget runs out.
    async fn generate(&self, job: &mut GenerationJob) -> GenieResult<Result<Vec<u8>, JobFailure>> {
        loop {
            let attempt = job.begin_attempt()?;
            let call = self.provider.generate(&job.prompt, job.slot.resolution_tier);
            let error = match tokio::time::timeout(self.request_timeout, call).await {
                Ok(Ok(image)) => return Ok(Ok(image.bytes)),
                Ok(Err(ProviderError::QuotaExhausted(message))) => {
                    if !self.quota_exhausted.swap(true, Ordering::SeqCst) {
                        warn!(%message, "Provider quota exhausted; no new jobs will start");
                    }
                    return Ok(Err(JobFailure::QuotaExhausted));
                }
                Ok(Err(ProviderError::Permanent(message))) => {
                    return Ok(Err(JobFailure::GenerationPermanent { message }));
                }
                Ok(Err(ProviderError::Transient(message))) => message,
                Err(_) => format!(
                    "request timed out after {}s",
                    self.request_timeout.as_secs()
                ),
            };

            if !self.policy.has_attempts_left(attempt) {
                return Ok(Err(JobFailure::GenerationTransient { message: error }));
            }
            let delay = self.policy.delay_after(attempt);
            debug!(src = %job.slot.src, attempt, error = %error, delay_ms = delay.as_millis() as u64, "Retrying generation");
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(Err(JobFailure::Cancelled)),
                _ = tokio::time::sleep(delay) => {}
            }
            if let Some(reason) = self.wait_for_budget().await? {
                return Ok(Err(reason));
            }
        }
    }

    /// Atomic write on the blocking pool. Hands the bytes back on success.
    async fn write(&self, src: &str, bytes: Vec<u8>) -> GenieResult<GenieResult<Vec<u8>>> {
        let sites = Arc::clone(&self.sites);
        let slug = self.slug.clone();
        let src = src.to_string();
        tokio::task::spawn_blocking(move || {
            sites
                .write_asset_atomic(&slug, &src, &bytes)
                .map(|()| bytes)
        })
        .await
        .context("asset write task stopped unexpectedly")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::application::{InProcessSiteLock, IntervalRateLimiter};
    use crate::application::ports::{
        GeneratedImage, MockImageProvider, MockSiteStore, NoProgress,
    };
    use crate::domain::{ManifestEntry, ResolutionTier, SiteManifest};
    use crate::error::GenieError;

    const MODEL: &str = "gemini-3-pro-image-preview";

    fn html(count: usize) -> String {
        let mut html = String::from(r#"<img src="assets/hero.png" alt="Hero">"#);
        for i in 1..count {
            html.push_str(&format!(r#"<img src="assets/feature-{i}.png">"#));
        }
        html
    }

    /// Store with `count` slots, each in `state`, expecting `writes` writes.
    fn store(count: usize, state: AssetState, writes: usize) -> MockSiteStore {
        let mut sites = MockSiteStore::new();
        sites.expect_normalize_layout().returning(|_| Ok(false));
        sites.expect_exists().returning(|_| true);
        sites.expect_site_dir().returning(|_| "/sites/habitlab".into());
        sites.expect_manifest().returning(|slug| {
            Ok(SiteManifest::new(
                slug.clone(),
                vec![ManifestEntry::new("index.html", b"...")],
            ))
        });
        let markup = html(count);
        sites
            .expect_read_text()
            .returning(move |_, _| Ok(markup.clone()));
        sites.expect_asset_state().returning(move |_, _| Ok(state));
        sites
            .expect_write_asset_atomic()
            .times(writes)
            .returning(|_, _, _| Ok(()));
        sites
    }

    fn provider(script: impl Fn(usize) -> Result<GeneratedImage, ProviderError> + Send + 'static) -> MockImageProvider {
        let mut provider = MockImageProvider::new();
        provider.expect_model().return_const(MODEL.to_string());
        let mut calls = 0;
        provider.expect_generate().returning(move |_, _| {
            calls += 1;
            script(calls)
        });
        provider
    }

    fn image() -> Result<GeneratedImage, ProviderError> {
        Ok(GeneratedImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: Some("image/png".into()),
            usage: None,
        })
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            requests_per_minute: 0,
            retry_base_delay: Duration::from_millis(10),
            ..PipelineConfig::default()
        }
    }

    fn pipeline(provider: MockImageProvider, sites: MockSiteStore, config: PipelineConfig) -> AssetPipeline {
        let limiter = Arc::new(IntervalRateLimiter::per_minute(config.requests_per_minute));
        AssetPipeline::new(
            Arc::new(provider),
            Arc::new(sites),
            Arc::new(InProcessSiteLock::new()),
            limiter,
            config,
        )
    }

    fn request(overwrite: bool) -> ImagesRequest {
        ImagesRequest {
            slug: "habitlab".into(),
            overwrite,
            product_context: None,
        }
    }

    async fn run(pipeline: &AssetPipeline, overwrite: bool) -> ImagesReport {
        pipeline
            .run(&request(overwrite), &CancellationToken::new(), Arc::new(NoProgress))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn complete_site_is_skipped_without_writes() {
        let mut provider = MockImageProvider::new();
        provider.expect_model().return_const(MODEL.to_string());
        provider.expect_generate().times(0);
        let sites = store(3, AssetState::Present { size: 2048 }, 0);

        let report = run(&pipeline(provider, sites, config()), false).await;
        let summary = report.summary();
        assert_eq!((summary.generated, summary.skipped, summary.failed), (0, 3, 0));
        assert_eq!(summary.estimated_cost_usd, 0.0);
    }

    #[tokio::test]
    async fn missing_and_placeholder_images_are_generated() {
        let sites = store(2, AssetState::Placeholder, 2);
        let report = run(&pipeline(provider(|_| image()), sites, config()), false).await;

        assert_eq!(report.generated(), 2);
        let hero = &report.slots["assets/hero.png"];
        assert_eq!(hero.tier, ResolutionTier::TwoK);
        assert_eq!(hero.outcome, SlotOutcome::Generated { bytes: 4 });
        assert!(report.estimated_cost_usd() > 0.0);
    }

    #[tokio::test]
    async fn overwrite_regenerates_everything() {
        let sites = store(3, AssetState::Present { size: 10 }, 3);
        let report = run(&pipeline(provider(|_| image()), sites, config()), true).await;
        assert_eq!(report.generated(), 3);
        assert_eq!(report.skipped(), 0);
    }

    #[tokio::test]
    async fn quota_exhaustion_stops_unstarted_jobs() {
        let sites = store(5, AssetState::Missing, 2);
        let provider = provider(|call| {
            if call <= 2 {
                image()
            } else {
                Err(ProviderError::QuotaExhausted("RESOURCE_EXHAUSTED".into()))
            }
        });

        let report = run(&pipeline(provider, sites, config()), false).await;

        assert!(report.quota_exhausted);
        assert_eq!(report.generated(), 2);
        assert_eq!(report.failed(), 3);
        assert!(
            report
                .failures()
                .all(|(_, reason)| *reason == JobFailure::QuotaExhausted)
        );
    }

    #[tokio::test]
    async fn permanent_errors_fail_only_their_slot() {
        let sites = store(3, AssetState::Missing, 2);
        let provider = provider(|call| {
            if call == 1 {
                Err(ProviderError::Permanent("safety policy".into()))
            } else {
                image()
            }
        });

        let report = run(&pipeline(provider, sites, config()), false).await;
        assert_eq!(report.generated(), 2);
        assert_eq!(report.failed(), 1);
        let (_, reason) = report.failures().next().unwrap();
        assert!(matches!(reason, JobFailure::GenerationPermanent { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_within_budget() {
        let sites = store(1, AssetState::Missing, 1);
        let provider = provider(|call| {
            if call < 3 {
                Err(ProviderError::Transient("503".into()))
            } else {
                image()
            }
        });

        let report = run(&pipeline(provider, sites, config()), false).await;
        let hero = &report.slots["assets/hero.png"];
        assert_eq!(hero.attempts, 3);
        assert!(matches!(hero.outcome, SlotOutcome::Generated { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_past_budget_fail_the_slot() {
        let sites = store(1, AssetState::Missing, 0);
        let provider = provider(|_| Err(ProviderError::Transient("503".into())));

        let report = run(&pipeline(provider, sites, config()), false).await;
        let hero = &report.slots["assets/hero.png"];
        assert_eq!(hero.attempts, 3);
        assert!(matches!(
            hero.outcome,
            SlotOutcome::Failed {
                reason: JobFailure::GenerationTransient { .. }
            }
        ));
    }

    #[tokio::test]
    async fn cancelled_run_starts_nothing() {
        let mut provider = MockImageProvider::new();
        provider.expect_model().return_const(MODEL.to_string());
        provider.expect_generate().times(0);
        let sites = store(3, AssetState::Missing, 0);
        let pipeline = pipeline(provider, sites, config());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = pipeline
            .run(&request(false), &cancel, Arc::new(NoProgress))
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.failed(), 3);
        assert!(report.failures().all(|(_, r)| *r == JobFailure::Cancelled));
    }

    #[tokio::test]
    async fn write_failures_are_reported_per_slot() {
        let mut sites = MockSiteStore::new();
        sites.expect_normalize_layout().returning(|_| Ok(false));
        sites.expect_exists().returning(|_| true);
        sites.expect_manifest().returning(|slug| {
            Ok(SiteManifest::new(
                slug.clone(),
                vec![ManifestEntry::new("index.html", b"...")],
            ))
        });
        sites
            .expect_read_text()
            .returning(|_, _| Ok(html(1)));
        sites
            .expect_asset_state()
            .returning(|_, _| Ok(AssetState::Missing));
        sites.expect_write_asset_atomic().returning(|_, path, _| {
            Err(ApplicationError::Storage {
                path: path.into(),
                reason: "read-only file system".into(),
            }
            .into())
        });

        let report = run(&pipeline(provider(|_| image()), sites, config()), false).await;
        assert!(matches!(
            report.slots["assets/hero.png"].outcome,
            SlotOutcome::Failed {
                reason: JobFailure::Storage { .. }
            }
        ));
    }

    /// Fails the `fail_on`-th acquire; every other one passes at once.
    struct FlakyLimiter {
        calls: AtomicUsize,
        fail_on: usize,
    }

    #[async_trait]
    impl RateLimiter for FlakyLimiter {
        async fn acquire(&self) -> GenieResult<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(ApplicationError::Storage {
                    path: "locks/gemini.rate".into(),
                    reason: "permission denied".into(),
                }
                .into());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn rate_budget_errors_fail_only_their_slot() {
        let sites = store(2, AssetState::Missing, 1);
        let limiter = Arc::new(FlakyLimiter {
            calls: AtomicUsize::new(0),
            fail_on: 2,
        });
        let pipeline = AssetPipeline::new(
            Arc::new(provider(|_| image())),
            Arc::new(sites),
            Arc::new(InProcessSiteLock::new()),
            limiter,
            config(),
        );

        let report = run(&pipeline, false).await;

        assert_eq!(report.generated(), 1);
        assert_eq!(report.failed(), 1);
        let (_, reason) = report.failures().next().unwrap();
        assert!(matches!(reason, JobFailure::Internal { message } if message.contains("permission denied")));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_waiting_for_the_site_lock() {
        let mut provider = MockImageProvider::new();
        provider.expect_model().return_const(MODEL.to_string());
        provider.expect_generate().times(0);
        let locks = Arc::new(InProcessSiteLock::new());
        let slug = Slug::parse("habitlab").unwrap();
        let _held = locks.acquire(&slug).await.unwrap();
        let pipeline = AssetPipeline::new(
            Arc::new(provider),
            Arc::new(MockSiteStore::new()),
            Arc::clone(&locks) as Arc<dyn SiteLock>,
            Arc::new(IntervalRateLimiter::per_minute(0)),
            config(),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(2),
            pipeline.run(&request(false), &cancel, Arc::new(NoProgress)),
        )
        .await
        .expect("run should stop once cancelled")
        .unwrap_err();
        assert!(matches!(
            err,
            GenieError::Application(ApplicationError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn nested_layout_is_repaired_before_scanning() {
        let mut seq = mockall::Sequence::new();
        let mut sites = MockSiteStore::new();
        sites
            .expect_normalize_layout()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
        sites
            .expect_exists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| false);
        sites.expect_site_dir().returning(|_| "/sites/habitlab".into());
        let mut provider = MockImageProvider::new();
        provider.expect_model().return_const(MODEL.to_string());

        let err = pipeline(provider, sites, config())
            .plan(&request(false), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenieError::Application(ApplicationError::SiteNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn plan_estimates_without_generating() {
        let mut provider = MockImageProvider::new();
        provider.expect_model().return_const(MODEL.to_string());
        provider.expect_generate().times(0);
        let sites = store(3, AssetState::Missing, 0);

        let report = pipeline(provider, sites, config())
            .plan(&request(false), &CancellationToken::new())
            .await
            .unwrap();
        let summary = report.summary();
        assert!(report.dry_run);
        assert_eq!(summary.planned, 3);
        assert!(summary.estimated_cost_usd > 0.0);
        assert_eq!(summary.unpriced, 0);
    }

    #[tokio::test]
    async fn unknown_site_is_an_error() {
        let mut sites = MockSiteStore::new();
        sites.expect_normalize_layout().returning(|_| Ok(false));
        sites.expect_exists().returning(|_| false);
        sites.expect_site_dir().returning(|_| "/sites/ghost".into());
        let mut provider = MockImageProvider::new();
        provider.expect_model().return_const(MODEL.to_string());

        let err = pipeline(provider, sites, config())
            .run(&request(false), &CancellationToken::new(), Arc::new(NoProgress))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenieError::Application(ApplicationError::SiteNotFound { .. })
        ));
    }
}
