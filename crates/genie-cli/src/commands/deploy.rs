//! `landing-genie deploy` - publish a site to `<slug>.<root-domain>`.

use std::sync::Arc;
use std::time::Duration;

use genie_adapters::{CloudflareClient, FileSiteLock, HttpSiteProbe, WranglerUploadTool};
use genie_core::{
    application::{DeployFailure, DeployReport, DeployService},
    domain::DeployStage,
    error::{Context as _, GenieError},
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    cli::DeployArgs,
    commands::{cancel_on_ctrl_c, prepare_site, runtime},
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
    progress::DeployProgress,
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[instrument(skip_all, fields(slug = %args.slug))]
pub fn execute(args: DeployArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let (slug, sites) = prepare_site(&args.slug, &config)?;
    let root = config.root_domain()?;
    let credentials = config.cloudflare_credentials()?;

    let mut deploy_config = config.deploy_config(root);
    if args.no_verify {
        deploy_config.verify_timeout = Duration::ZERO;
    }

    let mut uploader = WranglerUploadTool::new(credentials.clone());
    if let Some(bin) = &config.deploy.wrangler_bin {
        uploader = uploader.with_program(bin);
    }
    let platform = CloudflareClient::new(
        credentials,
        Arc::new(uploader),
        deploy_config.platform_timeout,
    )
    .map_err(GenieError::from)?;
    let probe = HttpSiteProbe::new(PROBE_TIMEOUT).context("building the HTTP probe")?;

    let service = DeployService::new(
        Arc::new(platform),
        Arc::new(sites),
        Arc::new(FileSiteLock::new(config.locks_dir())),
        Arc::new(probe),
        deploy_config,
    );

    output.header(&format!("Deploying {slug}"))?;
    let progress = DeployProgress::new(output.spinner());
    let result = runtime()?.block_on(async {
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(&cancel);
        service.deploy(slug.as_str(), &cancel, &progress).await
    });
    progress.finish();

    match result {
        Ok(report) => render(&report, &output),
        Err(failure) => {
            if output.is_json() {
                output.json(&FailureView::from(&failure))?;
            }
            Err(failure.into())
        }
    }
}

fn render(report: &DeployReport, output: &OutputManager) -> CliResult<()> {
    if output.is_json() {
        output.json(report)?;
        return Ok(());
    }

    output.success(&format!("{} is live at {}", report.slug, report.live_url()))?;
    output.print(&format!(
        "  Project:    {} ({})",
        report.names.project_name,
        if report.project_created { "created" } else { "existing" }
    ))?;
    output.print(&format!("  Deployment: {}", report.deployment.url))?;
    output.print(&format!(
        "  Domain:     {} ({})",
        report.domain.name, report.domain.status
    ))?;
    output.print(&format!("  DNS record: {}", report.dns.label()))?;
    for warning in &report.warnings {
        output.warning(&warning.to_string())?;
    }
    Ok(())
}

/// JSON shape of a failed deploy.
#[derive(Debug, Serialize)]
struct FailureView<'a> {
    run_id: String,
    slug: &'a str,
    status: &'static str,
    stage: DeployStage,
    error: String,
    retryable: bool,
    stages: &'a [DeployStage],
}

impl<'a> From<&'a DeployFailure> for FailureView<'a> {
    fn from(failure: &'a DeployFailure) -> Self {
        Self {
            run_id: failure.run_id.to_string(),
            slug: &failure.slug,
            status: "deploy_failed",
            stage: failure.stage,
            error: failure.error.to_string(),
            retryable: failure.retryable,
            stages: &failure.stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genie_core::application::ApplicationError;

    #[test]
    fn failure_view_names_stage_and_retry() {
        let failure = DeployFailure {
            run_id: uuid::Uuid::nil(),
            slug: "habitlab".into(),
            stage: DeployStage::DomainReconciling,
            error: ApplicationError::Lock {
                slug: "habitlab".into(),
                reason: "busy".into(),
            }
            .into(),
            retryable: true,
            names: None,
            stages: vec![DeployStage::Resolving, DeployStage::DomainReconciling],
        };

        let json = serde_json::to_value(FailureView::from(&failure)).unwrap();
        assert_eq!(json["stage"], "domain_reconciling");
        assert_eq!(json["status"], "deploy_failed");
        assert_eq!(json["retryable"], true);
        assert_eq!(json["stages"].as_array().unwrap().len(), 2);
    }
}
