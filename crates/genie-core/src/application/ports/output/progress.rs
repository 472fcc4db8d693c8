use crate::domain::{DeployStage, JobStatus};

/// Receives progress events from long-running services.
///
/// All methods default to doing nothing, so sinks only implement what they
/// display.
pub trait ProgressSink: Send + Sync {
    fn stage_started(&self, _stage: DeployStage) {}

    fn stage_finished(&self, _stage: DeployStage) {}

    fn jobs_planned(&self, _total: usize) {}

    fn job_started(&self, _src: &str) {}

    fn job_finished(&self, _src: &str, _status: &JobStatus) {}
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}
