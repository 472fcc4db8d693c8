//! Run settings handed to services by the composition root.
//!
//! Credentials are not part of these structs; each adapter receives its own.

use std::time::Duration;

use crate::application::retry::RetryPolicy;
use crate::domain::{PricingTable, RootDomain, ScanRules};

#[derive(Debug, Clone, PartialEq)]
pub struct DeployConfig {
    pub root_domain: RootDomain,
    /// Upload attempts including the first one.
    pub upload_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Budget for a single upload attempt.
    pub upload_timeout: Duration,
    /// Budget for each platform API call.
    pub platform_timeout: Duration,
    /// Total time spent polling the live site. Zero disables verification.
    pub verify_timeout: Duration,
    pub verify_interval: Duration,
}

impl DeployConfig {
    pub fn new(root_domain: RootDomain) -> Self {
        Self {
            root_domain,
            upload_attempts: 3,
            retry_base_delay: Duration::from_secs(2),
            retry_max_delay: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(300),
            platform_timeout: Duration::from_secs(30),
            verify_timeout: Duration::from_secs(60),
            verify_interval: Duration::from_secs(5),
        }
    }

    pub fn upload_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.upload_attempts, self.retry_base_delay, self.retry_max_delay)
    }

    pub fn verification_enabled(&self) -> bool {
        !self.verify_timeout.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub scan: ScanRules,
    /// Concurrent generation jobs.
    pub workers: usize,
    /// Provider request budget shared by all workers. Zero means unlimited.
    pub requests_per_minute: u32,
    /// Provider calls per job including the first one.
    pub generation_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Budget for a single provider call.
    pub request_timeout: Duration,
    pub pricing: PricingTable,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scan: ScanRules::default(),
            workers: 4,
            requests_per_minute: 10,
            generation_attempts: 3,
            retry_base_delay: Duration::from_secs(2),
            retry_max_delay: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            pricing: PricingTable::default(),
        }
    }
}

impl PipelineConfig {
    pub fn generation_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.generation_attempts,
            self.retry_base_delay,
            self.retry_max_delay,
        )
    }
}
