//! Generation job state machine.
//!
//! `Pending → Running → Succeeded | Failed`, plus `Pending → Failed` for jobs
//! that never started (quota exhausted, cancelled). Terminal states are final
//! and the output bytes can be recorded only once.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::assets::AssetSlot;
use crate::domain::error::DomainError;
use crate::domain::pricing::CostEstimate;

/// Why a job ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobFailure {
    /// Transient provider errors outlasted the attempt budget.
    GenerationTransient { message: String },
    /// The provider refused the request; retrying will not help.
    GenerationPermanent { message: String },
    QuotaExhausted,
    Cancelled,
    /// The image was generated but could not be written.
    Storage { message: String },
    /// The job's own machinery failed (rate budget, worker task).
    Internal { message: String },
}

impl JobFailure {
    /// Whether re-running the command may succeed without changes.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::GenerationPermanent { .. })
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GenerationTransient { message } => write!(f, "transient error: {message}"),
            Self::GenerationPermanent { message } => write!(f, "rejected: {message}"),
            Self::QuotaExhausted => f.write_str("quota exhausted"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Storage { message } => write!(f, "write failed: {message}"),
            Self::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed { reason: JobFailure },
}

impl JobStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub slot: AssetSlot,
    pub prompt: String,
    pub estimated_cost: Option<CostEstimate>,
    status: JobStatus,
    attempts: u32,
    #[serde(skip)]
    output: Option<Vec<u8>>,
}

impl GenerationJob {
    pub fn new(slot: AssetSlot, prompt: String, estimated_cost: Option<CostEstimate>) -> Self {
        Self {
            slot,
            prompt,
            estimated_cost,
            status: JobStatus::Pending,
            attempts: 0,
            output: None,
        }
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn output_bytes(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    pub fn start(&mut self) -> Result<(), DomainError> {
        self.transition(JobStatus::Running)
    }

    /// Count one provider call. Only valid while running.
    pub fn begin_attempt(&mut self) -> Result<u32, DomainError> {
        if self.status != JobStatus::Running {
            return Err(self.invalid("running"));
        }
        self.attempts += 1;
        Ok(self.attempts)
    }

    /// Store the generated bytes. A job's output is written once.
    pub fn record_output(&mut self, bytes: Vec<u8>) -> Result<(), DomainError> {
        if self.output.is_some() {
            return Err(DomainError::OutputAlreadyWritten {
                src: self.slot.src.clone(),
            });
        }
        if self.status != JobStatus::Running {
            return Err(self.invalid("running"));
        }
        self.output = Some(bytes);
        Ok(())
    }

    pub fn succeed(&mut self) -> Result<(), DomainError> {
        if self.output.is_none() {
            return Err(self.invalid("succeeded"));
        }
        self.transition(JobStatus::Succeeded)
    }

    pub fn fail(&mut self, reason: JobFailure) -> Result<(), DomainError> {
        self.transition(JobStatus::Failed { reason })
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), DomainError> {
        let allowed = matches!(
            (&self.status, &to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed { .. })
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed { .. })
        );
        if !allowed {
            return Err(self.invalid(to.name()));
        }
        self.status = to;
        Ok(())
    }

    fn invalid(&self, to: &'static str) -> DomainError {
        DomainError::InvalidJobTransition {
            src: self.slot.src.clone(),
            from: self.status.name(),
            to,
        }
    }
}
