//! `landing-genie images` - generate the images a site's pages reference.

use std::sync::Arc;

use genie_adapters::{FileRateLimiter, FileSiteLock, GeminiCredentials, GeminiImageProvider};
use genie_core::{
    application::{AssetPipeline, ImagesReport, ImagesRequest, ImagesSummary, SlotOutcome},
    domain::JobFailure,
    error::Context as _,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    cli::ImagesArgs,
    commands::{cancel_on_ctrl_c, prepare_site, runtime},
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
    progress::ImagesProgress,
};

/// File under the locks directory holding the shared request budget.
const RATE_FILE: &str = "gemini.rate";

#[instrument(skip_all, fields(slug = %args.slug, dry_run = args.dry_run))]
pub fn execute(args: ImagesArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let (slug, sites) = prepare_site(&args.slug, &config)?;

    let mut pipeline_config = config.pipeline_config()?;
    if let Some(workers) = args.workers {
        pipeline_config.workers = usize::from(workers);
    }

    let credentials = match config.gemini_credentials() {
        Ok(credentials) => credentials,
        // A dry run never reaches the provider.
        Err(_) if args.dry_run => GeminiCredentials {
            api_key: String::new(),
        },
        Err(e) => return Err(e),
    };
    let provider = GeminiImageProvider::new(
        credentials,
        config.gemini.model.clone(),
        pipeline_config.request_timeout,
    )
    .context("building the Gemini client")?;

    let request = ImagesRequest {
        slug: slug.to_string(),
        overwrite: args.overwrite,
        product_context: product_context(&args, &config)?,
    };

    let locks_dir = config.locks_dir();
    let pipeline = AssetPipeline::new(
        Arc::new(provider),
        Arc::new(sites),
        Arc::new(FileSiteLock::new(&locks_dir)),
        Arc::new(FileRateLimiter::per_minute(
            locks_dir.join(RATE_FILE),
            pipeline_config.requests_per_minute,
        )),
        pipeline_config,
    );

    if args.dry_run {
        let report = runtime()?.block_on(async {
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(&cancel);
            pipeline.plan(&request, &cancel).await
        })?;
        return render(&report, &output);
    }

    output.header(&format!("Generating images for {slug}"))?;
    let progress = ImagesProgress::new(output.progress_bar(0));
    let result = runtime()?.block_on(async {
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(&cancel);
        pipeline
            .run(&request, &cancel, Arc::new(progress.clone()))
            .await
    });
    progress.finish();

    let report = result?;
    render(&report, &output)?;
    outcome(&report)
}

/// `--prompt` wins, then `--interactive`, then `images.product_context`.
fn product_context(args: &ImagesArgs, config: &AppConfig) -> CliResult<Option<String>> {
    if let Some(prompt) = &args.prompt {
        return Ok(non_blank(prompt));
    }
    if args.interactive {
        return ask_product_context(config.images.product_context.as_deref());
    }
    Ok(config.images.product_context.as_deref().and_then(non_blank))
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(feature = "interactive")]
fn ask_product_context(default: Option<&str>) -> CliResult<Option<String>> {
    let mut input = dialoguer::Input::<String>::new()
        .with_prompt("Describe the product (used in every image prompt)")
        .allow_empty(true);
    if let Some(default) = default {
        input = input.default(default.to_string());
    }
    let answer = input.interact_text().map_err(|e| CliError::InvalidInput {
        message: format!("could not read the product description: {e}"),
        source: Some(Box::new(e)),
    })?;
    Ok(non_blank(&answer))
}

#[cfg(not(feature = "interactive"))]
fn ask_product_context(_default: Option<&str>) -> CliResult<Option<String>> {
    Err(CliError::FeatureNotAvailable {
        feature: "interactive",
    })
}

/// Map a finished run to the exit status.  Per-slot failures alone do not
/// fail the command; the report lists them.
fn outcome(report: &ImagesReport) -> CliResult<()> {
    if report.cancelled {
        return Err(CliError::Cancelled);
    }
    if report.quota_exhausted {
        return Err(CliError::QuotaExhausted {
            generated: report.generated(),
            remaining: report
                .failures()
                .filter(|(_, reason)| **reason == JobFailure::QuotaExhausted)
                .count(),
        });
    }
    Ok(())
}

/// JSON shape: the report plus its totals.
#[derive(Serialize)]
struct ReportView<'a> {
    #[serde(flatten)]
    report: &'a ImagesReport,
    summary: ImagesSummary,
}

fn render(report: &ImagesReport, output: &OutputManager) -> CliResult<()> {
    let summary = report.summary();
    if output.is_json() {
        output.json(&ReportView { report, summary })?;
        return Ok(());
    }

    let title = if report.dry_run { "Plan" } else { "Results" };
    output.header(&format!("{title} for {} ({})", report.slug, report.model))?;
    for (src, slot) in &report.slots {
        let status = match &slot.outcome {
            SlotOutcome::Generated { bytes } => format!("generated ({bytes} bytes)"),
            SlotOutcome::Skipped { .. } => "kept existing image".to_string(),
            SlotOutcome::Failed { reason } => format!("failed: {reason}"),
            SlotOutcome::Planned => match slot.estimated_cost {
                Some(cost) => format!("to generate (~${:.4})", cost.usd),
                None => "to generate".to_string(),
            },
        };
        output.print(&format!("  {src:<40} {:<3} {status}", slot.tier.as_str()))?;
    }
    for ignored in &report.ignored {
        output.warning(&format!("ignored image reference: {ignored}"))?;
    }

    if report.dry_run {
        output.info(&format!(
            "{} to generate, {} already present",
            summary.planned, summary.skipped
        ))?;
    } else {
        output.success(&format!(
            "{} generated, {} skipped, {} failed",
            summary.generated, summary.skipped, summary.failed
        ))?;
    }
    output.print(&format!(
        "  Cost: ${:.4} ({})",
        summary.estimated_cost_usd, summary.cost_label
    ))?;
    if summary.unpriced > 0 {
        output.warning(&format!(
            "{} image(s) use a model without a known price; set GEMINI_IMAGE_COST_PER_1K_TOKENS to include them",
            summary.unpriced
        ))?;
    }
    Ok(())
}
