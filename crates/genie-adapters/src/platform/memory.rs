//! In-memory platform for testing.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use genie_core::{
    application::ports::{PlatformClient, PlatformError, UploadError, UploadErrorKind},
    domain::{
        DesiredRecord, Deployment, DnsRecord, DomainAttachment, OWNER_MARKER, PagesProject,
        RecordAction, UpsertOutcome,
    },
};

/// Records every call so tests can assert on side effects.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlatform {
    inner: Arc<Mutex<MemoryPlatformInner>>,
}

#[derive(Debug, Default)]
struct MemoryPlatformInner {
    projects: BTreeMap<String, PagesProject>,
    /// Keyed by `(zone, name)`.
    records: BTreeMap<(String, String), DnsRecord>,
    upload_failures: VecDeque<UploadError>,
    uploaded_dirs: Vec<String>,
    project_creates: usize,
    dns_writes: usize,
    next_id: u64,
}

impl MemoryPlatformInner {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:08x}", self.next_id)
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryPlatformInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a record, e.g. one created by hand in the dashboard.
    pub fn with_record(self, zone: &str, record: DnsRecord) -> Self {
        self.state()
            .records
            .insert((zone.to_string(), record.name.clone()), record);
        self
    }

    /// The next uploads fail with these errors, in order.
    pub fn fail_uploads(self, errors: impl IntoIterator<Item = UploadError>) -> Self {
        self.state().upload_failures.extend(errors);
        self
    }

    pub fn project(&self, name: &str) -> Option<PagesProject> {
        self.state().projects.get(name).cloned()
    }

    pub fn record(&self, zone: &str, name: &str) -> Option<DnsRecord> {
        self.state()
            .records
            .get(&(zone.to_string(), name.to_string()))
            .cloned()
    }

    pub fn project_creates(&self) -> usize {
        self.state().project_creates
    }

    pub fn dns_writes(&self) -> usize {
        self.state().dns_writes
    }

    /// Upload attempts, including failed ones.
    pub fn upload_attempts(&self) -> usize {
        self.state().uploaded_dirs.len()
    }
}

#[async_trait]
impl PlatformClient for MemoryPlatform {
    async fn get_project(&self, name: &str) -> Result<Option<PagesProject>, PlatformError> {
        Ok(self.project(name))
    }

    async fn create_project(&self, name: &str) -> Result<PagesProject, PlatformError> {
        let mut state = self.state();
        if state.projects.contains_key(name) {
            return Err(PlatformError::api(format!("project '{name}' already exists")));
        }
        let project = PagesProject::new(name);
        state.projects.insert(name.to_string(), project.clone());
        state.project_creates += 1;
        Ok(project)
    }

    async fn upload_deployment(&self, name: &str, local_dir: &Path) -> Result<Deployment, UploadError> {
        let mut state = self.state();
        state.uploaded_dirs.push(local_dir.display().to_string());
        if let Some(err) = state.upload_failures.pop_front() {
            return Err(err);
        }

        let id = state.next_id("");
        let project = state
            .projects
            .get_mut(name)
            .ok_or_else(|| {
                UploadError::new(
                    UploadErrorKind::Rejected,
                    format!("project '{name}' does not exist"),
                )
            })?;
        project.latest_deployment_id = Some(id.clone());
        Ok(Deployment {
            url: format!("https://{id}.{}", project.subdomain),
            id,
        })
    }

    async fn attach_domain(&self, name: &str, fqdn: &str) -> Result<DomainAttachment, PlatformError> {
        let mut state = self.state();
        let project = state
            .projects
            .get_mut(name)
            .ok_or_else(|| PlatformError::not_found(format!("project '{name}' not found")))?;
        let newly_attached = !project.has_domain(fqdn);
        if newly_attached {
            project.domains.push(fqdn.to_string());
        }
        Ok(DomainAttachment {
            name: fqdn.to_string(),
            status: "active".into(),
            newly_attached,
        })
    }

    async fn get_dns_record(&self, zone: &str, name: &str) -> Result<Option<DnsRecord>, PlatformError> {
        Ok(self.record(zone, name))
    }

    async fn upsert_dns_record(
        &self,
        zone: &str,
        desired: &DesiredRecord,
    ) -> Result<UpsertOutcome, PlatformError> {
        let mut state = self.state();
        let key = (zone.to_string(), desired.name.clone());
        let existing = state.records.get(&key).cloned();

        let id = match DnsRecord::reconcile(existing.as_ref(), desired) {
            RecordAction::Keep => return Ok(UpsertOutcome::Unchanged),
            RecordAction::Conflict => {
                return Ok(existing.map_or(UpsertOutcome::Unchanged, |existing| {
                    UpsertOutcome::Conflict { existing }
                }));
            }
            RecordAction::Update { id } => Some(id),
            RecordAction::Create => None,
        };

        let outcome = if id.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        };
        let id = id.unwrap_or_else(|| state.next_id("rec-"));
        state.records.insert(
            key,
            DnsRecord {
                id,
                record_type: desired.record_type,
                name: desired.name.clone(),
                content: desired.content.clone(),
                proxied: desired.proxied,
                comment: Some(OWNER_MARKER.to_string()),
            },
        );
        state.dns_writes += 1;
        Ok(outcome)
    }
}
