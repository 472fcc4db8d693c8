//! Asset pipeline runs against a real sites directory.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use genie_adapters::{
    FileRateLimiter, FileSiteLock, LocalSiteStore, MemorySiteStore, ScriptedImageProvider,
};
use genie_core::{
    application::{InProcessSiteLock, IntervalRateLimiter, SlotOutcome},
    domain::{JobFailure, Slug},
    prelude::*,
};
use tempfile::TempDir;

const INDEX: &str = r#"<!doctype html>
<html><body>
  <section class="hero"><img src="assets/hero.png" alt="Hero shot"></section>
  <img src="assets/feature-1.png" alt="Fast setup">
  <img src="assets/logo.png" alt="Logo">
  <img src="https://cdn.example.com/external.png" alt="External">
</body></html>"#;

fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let site = dir.path().join("habitlab");
    fs::create_dir_all(site.join("assets")).unwrap();
    fs::write(site.join("index.html"), INDEX).unwrap();
    fs::write(site.join("assets/hero.png"), b"").unwrap();
    fs::write(site.join("assets/logo.png"), b"real logo").unwrap();
    dir
}

fn pipeline(root: &Path, provider: Arc<ScriptedImageProvider>, workers: usize) -> AssetPipeline {
    let config = PipelineConfig {
        workers,
        retry_base_delay: Duration::from_millis(1),
        retry_max_delay: Duration::from_millis(5),
        ..PipelineConfig::default()
    };
    AssetPipeline::new(
        provider,
        Arc::new(LocalSiteStore::new(root)),
        Arc::new(FileSiteLock::new(root.join(".locks"))),
        Arc::new(FileRateLimiter::per_minute(root.join(".locks/rate"), 6000)),
        config,
    )
}

fn request() -> ImagesRequest {
    ImagesRequest {
        slug: "habitlab".into(),
        overwrite: false,
        product_context: Some("A habit tracker for busy people".into()),
    }
}

#[tokio::test]
async fn fills_placeholders_and_keeps_real_images() {
    let sites = site();
    let provider = Arc::new(ScriptedImageProvider::succeeding("gemini-2.5-flash-image"));
    let pipeline = pipeline(sites.path(), Arc::clone(&provider), 2);

    let report = pipeline
        .run(&request(), &CancellationToken::new(), Arc::new(NoProgress))
        .await
        .unwrap();

    assert_eq!(report.generated(), 2);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.failed(), 0);
    assert!(report.summary().estimated_cost_usd > 0.0);

    let assets = sites.path().join("habitlab/assets");
    assert!(fs::read(assets.join("hero.png")).unwrap().starts_with(b"image-"));
    assert!(fs::read(assets.join("feature-1.png")).unwrap().starts_with(b"image-"));
    assert_eq!(fs::read(assets.join("logo.png")).unwrap(), b"real logo");
    assert!(
        provider
            .requests()
            .iter()
            .all(|(prompt, _)| prompt.contains("habit tracker"))
    );
}

#[tokio::test]
async fn second_run_makes_no_provider_calls() {
    let sites = site();
    let provider = Arc::new(ScriptedImageProvider::succeeding("gemini-2.5-flash-image"));
    let pipeline = pipeline(sites.path(), Arc::clone(&provider), 2);
    let cancel = CancellationToken::new();

    pipeline.run(&request(), &cancel, Arc::new(NoProgress)).await.unwrap();
    let calls = provider.calls();
    let again = pipeline.run(&request(), &cancel, Arc::new(NoProgress)).await.unwrap();

    assert_eq!(provider.calls(), calls);
    assert_eq!(again.generated(), 0);
    assert_eq!(again.skipped(), 3);
}

#[tokio::test]
async fn quota_exhaustion_stops_remaining_jobs() {
    let sites = site();
    let provider = Arc::new(ScriptedImageProvider::quota_after("gemini-2.5-flash-image", 1));
    let pipeline = pipeline(sites.path(), Arc::clone(&provider), 1);
    let request = ImagesRequest {
        overwrite: true,
        ..request()
    };

    let report = pipeline
        .run(&request, &CancellationToken::new(), Arc::new(NoProgress))
        .await
        .unwrap();

    assert!(report.quota_exhausted);
    assert_eq!(report.generated(), 1);
    assert_eq!(report.failed(), 2);
    assert!(report.failures().all(|(_, reason)| *reason == JobFailure::QuotaExhausted));
    assert_eq!(provider.calls(), 2);
}

/// Site whose generator nested the output under `sites/habitlab/`.
fn nested_site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("habitlab/sites/habitlab");
    fs::create_dir_all(nested.join("assets")).unwrap();
    fs::write(nested.join("index.html"), INDEX).unwrap();
    dir
}

#[tokio::test]
async fn nested_output_is_flattened_before_scanning() {
    let dir = nested_site();
    let provider = Arc::new(ScriptedImageProvider::succeeding("gemini-2.5-flash-image"));

    let report = pipeline(dir.path(), Arc::clone(&provider), 2)
        .plan(&request(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.count(|o| matches!(o, SlotOutcome::Planned)), 3);
    assert!(dir.path().join("habitlab/index.html").is_file());
    assert!(!dir.path().join("habitlab/sites").exists());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn flattening_waits_for_the_site_lock() {
    let dir = nested_site();
    let slug = Slug::parse("habitlab").unwrap();
    let held = FileSiteLock::new(dir.path().join(".locks"))
        .acquire(&slug)
        .await
        .unwrap();

    let provider = Arc::new(ScriptedImageProvider::succeeding("gemini-2.5-flash-image"));
    let pipeline = Arc::new(pipeline(dir.path(), provider, 2));
    let task = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.plan(&request(), &CancellationToken::new()).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!task.is_finished());
    assert!(dir.path().join("habitlab/sites/habitlab/index.html").is_file());

    drop(held);
    let report = task.await.unwrap().unwrap();
    assert_eq!(report.count(|o| matches!(o, SlotOutcome::Planned)), 3);
    assert!(!dir.path().join("habitlab/sites").exists());
}

#[tokio::test]
async fn in_memory_site_runs_end_to_end() {
    let store = MemorySiteStore::new()
        .with_file("habitlab", "index.html", "<p>stale</p>")
        .with_file("habitlab", "sites/habitlab/index.html", INDEX)
        .with_file("habitlab", "sites/habitlab/assets/logo.png", "real logo");
    let provider = Arc::new(ScriptedImageProvider::succeeding("gemini-2.5-flash-image"));
    let pipeline = AssetPipeline::new(
        Arc::clone(&provider) as Arc<dyn ImageProvider>,
        Arc::new(store.clone()),
        Arc::new(InProcessSiteLock::new()),
        Arc::new(IntervalRateLimiter::per_minute(0)),
        PipelineConfig::default(),
    );

    let report = pipeline
        .run(&request(), &CancellationToken::new(), Arc::new(NoProgress))
        .await
        .unwrap();

    assert_eq!(report.generated(), 2);
    assert_eq!(report.skipped(), 1);
    assert_eq!(store.write_count(), 2);
    assert_eq!(provider.calls(), 2);
    assert_eq!(store.read("habitlab", "index.html").unwrap(), INDEX.as_bytes());
    assert!(store.read("habitlab", "sites/habitlab/index.html").is_none());
    assert!(store.read("habitlab", "assets/hero.png").unwrap().starts_with(b"image-"));
}
