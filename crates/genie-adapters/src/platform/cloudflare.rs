//! Cloudflare REST client for Pages projects, custom domains and DNS.
//!
//! Uploads are delegated to an [`UploadTool`] (wrangler in production); the
//! REST API covers everything else.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use genie_core::{
    application::ports::{PlatformClient, PlatformError, PlatformErrorKind, UploadError, UploadTool},
    domain::{
        DesiredRecord, Deployment, DnsRecord, DomainAttachment, OWNER_MARKER, PagesProject,
        RecordAction, RecordType, UpsertOutcome,
    },
};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

pub const API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Branch name deployments are published under.
pub const PRODUCTION_BRANCH: &str = "production";

#[derive(Clone)]
pub struct CloudflareCredentials {
    pub account_id: String,
    pub api_token: String,
}

impl fmt::Debug for CloudflareCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareCredentials")
            .field("account_id", &self.account_id)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

pub struct CloudflareClient {
    http: reqwest::Client,
    base_url: String,
    credentials: CloudflareCredentials,
    uploader: Arc<dyn UploadTool>,
    zones: Mutex<HashMap<String, String>>,
}

impl fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Standard response wrapper of the v4 API.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProjectResult {
    name: String,
    subdomain: Option<String>,
    #[serde(default)]
    domains: Vec<String>,
    latest_deployment: Option<DeploymentRef>,
}

#[derive(Debug, Deserialize)]
struct DeploymentRef {
    id: String,
}

impl From<ProjectResult> for PagesProject {
    fn from(result: ProjectResult) -> Self {
        let mut project = PagesProject::new(result.name);
        if let Some(subdomain) = result.subdomain.filter(|s| !s.is_empty()) {
            project.subdomain = subdomain;
        }
        project.domains = result.domains;
        project.latest_deployment_id = result.latest_deployment.map(|d| d.id);
        project
    }
}

#[derive(Debug, Deserialize)]
struct DomainResult {
    name: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ZoneResult {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RecordResult {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
    #[serde(default)]
    proxied: bool,
    comment: Option<String>,
}

impl From<RecordResult> for DnsRecord {
    fn from(r: RecordResult) -> Self {
        Self {
            id: r.id,
            record_type: parse_record_type(&r.record_type),
            name: r.name,
            content: r.content,
            proxied: r.proxied,
            comment: r.comment,
        }
    }
}

fn parse_record_type(raw: &str) -> RecordType {
    match raw.to_ascii_uppercase().as_str() {
        "A" => RecordType::A,
        "AAAA" => RecordType::Aaaa,
        "CNAME" => RecordType::Cname,
        "TXT" => RecordType::Txt,
        "MX" => RecordType::Mx,
        _ => RecordType::Other,
    }
}

impl CloudflareClient {
    pub fn new(
        credentials: CloudflareCredentials,
        uploader: Arc<dyn UploadTool>,
        request_timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("landing-genie/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            credentials,
            uploader,
            zones: Mutex::new(HashMap::new()),
        })
    }

    /// Point the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn account_path(&self, rest: &str) -> String {
        format!("/accounts/{}/pages/projects{rest}", self.credentials.account_id)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Option<T>, PlatformError> {
        let url = format!("{}{path}", self.base_url);
        debug!(%method, %url, "Cloudflare request");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.credentials.api_token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::transport(format!("request to {path} failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PlatformError::transport(format!("reading response from {path}: {e}")))?;

        parse_envelope(status, &text)
    }

    async fn zone_id(&self, zone: &str) -> Result<String, PlatformError> {
        let mut zones = self.zones.lock().await;
        if let Some(id) = zones.get(zone) {
            return Ok(id.clone());
        }

        let found: Vec<ZoneResult> = self
            .request(Method::GET, "/zones", &[("name", zone), ("status", "active")], None)
            .await?
            .unwrap_or_default();
        let id = found
            .into_iter()
            .next()
            .map(|z| z.id)
            .ok_or_else(|| PlatformError::not_found(format!("no active zone named '{zone}'")))?;

        zones.insert(zone.to_string(), id.clone());
        Ok(id)
    }

    async fn find_record(&self, zone_id: &str, name: &str) -> Result<Option<DnsRecord>, PlatformError> {
        let records: Vec<RecordResult> = self
            .request(
                Method::GET,
                &format!("/zones/{zone_id}/dns_records"),
                &[("name", name)],
                None,
            )
            .await?
            .unwrap_or_default();

        // A CNAME cannot coexist with other records of the same name, so any
        // record here is either ours to update or a conflict.
        Ok(records.into_iter().next().map(DnsRecord::from))
    }
}

fn parse_envelope<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<Option<T>, PlatformError> {
    let envelope: Envelope<T> = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => {
            return Err(PlatformError::api(format!("unexpected response body: {e}")));
        }
        Err(_) => return Err(classify(status, snippet(text))),
    };

    if status.is_success() && envelope.success {
        return Ok(envelope.result);
    }

    let message = if envelope.errors.is_empty() {
        format!("HTTP {status}")
    } else {
        envelope
            .errors
            .iter()
            .map(|e| format!("{} (code {})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; ")
    };
    Err(classify(status, message))
}

fn classify(status: StatusCode, message: String) -> PlatformError {
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformErrorKind::Auth,
        StatusCode::NOT_FOUND => PlatformErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => PlatformErrorKind::Quota,
        s if s.is_server_error() => PlatformErrorKind::Transport,
        _ => PlatformErrorKind::Api,
    };
    PlatformError::new(kind, message)
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// `https://a1b2c3d4.lp-x.pages.dev` -> `a1b2c3d4`
fn deployment_id_from_url(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split(['.', '/'])
        .next()
        .unwrap_or_default()
        .to_string()
}

fn record_payload(desired: &DesiredRecord) -> Value {
    json!({
        "type": desired.record_type.as_str(),
        "name": desired.name,
        "content": desired.content,
        "proxied": desired.proxied,
        "ttl": 1,
        "comment": OWNER_MARKER,
    })
}

#[async_trait]
impl PlatformClient for CloudflareClient {
    #[instrument(skip(self))]
    async fn get_project(&self, name: &str) -> Result<Option<PagesProject>, PlatformError> {
        let path = self.account_path(&format!("/{name}"));
        match self.request::<ProjectResult>(Method::GET, &path, &[], None).await {
            Ok(project) => Ok(project.map(PagesProject::from)),
            Err(e) if e.kind == PlatformErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn create_project(&self, name: &str) -> Result<PagesProject, PlatformError> {
        let body = json!({ "name": name, "production_branch": PRODUCTION_BRANCH });
        let created: Option<ProjectResult> = self
            .request(Method::POST, &self.account_path(""), &[], Some(&body))
            .await?;
        info!(project = name, "Created Pages project");
        Ok(created.map_or_else(|| PagesProject::new(name), PagesProject::from))
    }

    #[instrument(skip(self, local_dir))]
    async fn upload_deployment(&self, name: &str, local_dir: &Path) -> Result<Deployment, UploadError> {
        let url = self.uploader.deploy(local_dir, name).await?;
        Ok(Deployment {
            id: deployment_id_from_url(&url),
            url,
        })
    }

    #[instrument(skip(self))]
    async fn attach_domain(&self, name: &str, fqdn: &str) -> Result<DomainAttachment, PlatformError> {
        let path = self.account_path(&format!("/{name}/domains"));
        let existing: Vec<DomainResult> = self
            .request(Method::GET, &path, &[], None)
            .await?
            .unwrap_or_default();

        if let Some(domain) = existing.into_iter().find(|d| d.name.eq_ignore_ascii_case(fqdn)) {
            return Ok(DomainAttachment {
                name: domain.name,
                status: domain.status,
                newly_attached: false,
            });
        }

        let body = json!({ "name": fqdn });
        let added: Option<DomainResult> = self.request(Method::POST, &path, &[], Some(&body)).await?;
        let status = added.map(|d| d.status).unwrap_or_else(|| "pending".into());
        info!(project = name, fqdn, %status, "Attached custom domain");
        Ok(DomainAttachment {
            name: fqdn.to_string(),
            status,
            newly_attached: true,
        })
    }

    #[instrument(skip(self))]
    async fn get_dns_record(&self, zone: &str, name: &str) -> Result<Option<DnsRecord>, PlatformError> {
        let zone_id = self.zone_id(zone).await?;
        self.find_record(&zone_id, name).await
    }

    #[instrument(skip(self, desired), fields(name = %desired.name))]
    async fn upsert_dns_record(
        &self,
        zone: &str,
        desired: &DesiredRecord,
    ) -> Result<UpsertOutcome, PlatformError> {
        let zone_id = self.zone_id(zone).await?;
        let existing = self.find_record(&zone_id, &desired.name).await?;
        let records = format!("/zones/{zone_id}/dns_records");
        let payload = record_payload(desired);

        match DnsRecord::reconcile(existing.as_ref(), desired) {
            RecordAction::Create => {
                self.request::<Value>(Method::POST, &records, &[], Some(&payload))
                    .await?;
                info!(name = %desired.name, target = %desired.content, "Created DNS record");
                Ok(UpsertOutcome::Created)
            }
            RecordAction::Update { id } => {
                self.request::<Value>(Method::PUT, &format!("{records}/{id}"), &[], Some(&payload))
                    .await?;
                info!(name = %desired.name, target = %desired.content, "Updated DNS record");
                Ok(UpsertOutcome::Updated)
            }
            RecordAction::Keep => Ok(UpsertOutcome::Unchanged),
            RecordAction::Conflict => {
                let existing = existing.ok_or_else(|| {
                    PlatformError::api("conflict reported without an existing record")
                })?;
                warn!(name = %desired.name, content = %existing.content, "DNS record owned by someone else");
                Ok(UpsertOutcome::Conflict { existing })
            }
        }
    }
}
