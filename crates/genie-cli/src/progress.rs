//! Terminal progress for long-running commands.
//!
//! Both sinks wrap an `indicatif` bar obtained from [`OutputManager`]; the bar
//! is hidden in quiet, plain and JSON modes so the sinks can always be used.
//!
//! [`OutputManager`]: crate::output::OutputManager

use genie_core::{
    application::ports::ProgressSink,
    domain::{DeployStage, JobStatus},
};
use indicatif::ProgressBar;

/// Spinner showing the current deploy stage as `[n/5] label`.
#[derive(Clone)]
pub struct DeployProgress {
    bar: ProgressBar,
}

impl DeployProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for DeployProgress {
    fn stage_started(&self, stage: DeployStage) {
        if stage == DeployStage::Deployed {
            return;
        }
        self.bar
            .set_prefix(format!("[{}/{}]", stage.step(), DeployStage::STEPS));
        self.bar.set_message(stage_label(stage));
    }

    fn stage_finished(&self, stage: DeployStage) {
        if stage != DeployStage::Deployed {
            self.bar.println(format!("  \u{2713} {}", stage_label(stage)));
        }
    }
}

fn stage_label(stage: DeployStage) -> &'static str {
    match stage {
        DeployStage::Resolving => "Resolving site",
        DeployStage::ProjectEnsuring => "Ensuring Pages project",
        DeployStage::Uploading => "Uploading files",
        DeployStage::DomainReconciling => "Reconciling domain and DNS",
        DeployStage::Verifying => "Waiting for the site to serve",
        DeployStage::Deployed => "Deployed",
    }
}

/// Bar advancing once per finished generation job.
#[derive(Clone)]
pub struct ImagesProgress {
    bar: ProgressBar,
}

impl ImagesProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for ImagesProgress {
    fn jobs_planned(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn job_started(&self, src: &str) {
        self.bar.set_message(src.to_string());
    }

    fn job_finished(&self, src: &str, status: &JobStatus) {
        if let JobStatus::Failed { reason } = status {
            self.bar.println(format!("  \u{2717} {src}: {reason}"));
        }
        self.bar.inc(1);
    }
}
