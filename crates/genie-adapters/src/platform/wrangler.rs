//! Upload through the `wrangler` CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use genie_core::application::ports::{UploadError, UploadErrorKind, UploadTool};
use tokio::process::Command;
use tracing::{debug, info, instrument};

use super::cloudflare::{CloudflareCredentials, PRODUCTION_BRANCH};

/// Variables inherited from the parent environment. Everything else,
/// including other API keys, is withheld from the child process.
const PASSTHROUGH_ENV: &[&str] = &[
    "PATH",
    "HOME",
    "USERPROFILE",
    "APPDATA",
    "LOCALAPPDATA",
    "SYSTEMROOT",
    "TMPDIR",
    "TEMP",
    "TMP",
    "XDG_CONFIG_HOME",
    "NODE_EXTRA_CA_CERTS",
    "HTTPS_PROXY",
    "HTTP_PROXY",
    "NO_PROXY",
];

/// Output fragments that point at a network problem rather than a refusal.
const TRANSIENT_MARKERS: &[&str] = &[
    "ECONNRESET",
    "ETIMEDOUT",
    "ENOTFOUND",
    "EAI_AGAIN",
    "socket hang up",
    "fetch failed",
    "503",
    "502",
    "Service Unavailable",
    "timed out",
];

#[derive(Debug, Clone)]
pub struct WranglerUploadTool {
    program: PathBuf,
    credentials: CloudflareCredentials,
}

impl WranglerUploadTool {
    pub fn new(credentials: CloudflareCredentials) -> Self {
        Self {
            program: PathBuf::from("wrangler"),
            credentials,
        }
    }

    /// Use a specific binary instead of `wrangler` from `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, local_dir: &Path, project_name: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("pages")
            .arg("deploy")
            .arg(local_dir)
            .args(["--project-name", project_name])
            .args(["--branch", PRODUCTION_BRANCH])
            .arg("--commit-dirty=true")
            .env_clear()
            .env("CLOUDFLARE_ACCOUNT_ID", &self.credentials.account_id)
            .env("CLOUDFLARE_API_TOKEN", &self.credentials.api_token)
            .env("WRANGLER_SEND_METRICS", "false")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for key in PASSTHROUGH_ENV {
            if let Some(value) = std::env::var_os(key) {
                cmd.env(key, value);
            }
        }
        cmd
    }
}

#[async_trait]
impl UploadTool for WranglerUploadTool {
    #[instrument(skip(self, local_dir), fields(dir = %local_dir.display()))]
    async fn deploy(&self, local_dir: &Path, project_name: &str) -> Result<String, UploadError> {
        let output = self
            .command(local_dir, project_name)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => UploadError::new(
                    UploadErrorKind::ToolMissing,
                    format!("'{}' not found on PATH", self.program.display()),
                ),
                _ => UploadError::transient(format!("failed to run wrangler: {e}")),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(status = %output.status, "wrangler finished");

        if !output.status.success() {
            return Err(classify_failure(&stdout, &stderr));
        }

        let url = parse_deployment_url(&stdout).ok_or_else(|| {
            UploadError::new(
                UploadErrorKind::Rejected,
                format!("wrangler succeeded but printed no deployment URL: {}", tail(&stdout)),
            )
        })?;
        info!(%url, "Upload complete");
        Ok(url)
    }
}

fn classify_failure(stdout: &str, stderr: &str) -> UploadError {
    let combined = format!("{stdout}\n{stderr}");
    let kind = if TRANSIENT_MARKERS.iter().any(|m| combined.contains(m)) {
        UploadErrorKind::Transient
    } else {
        UploadErrorKind::Rejected
    };
    let detail = if stderr.trim().is_empty() { stdout } else { stderr };
    UploadError::new(kind, tail(detail))
}

/// First `https://...pages.dev` URL in the tool's output.
fn parse_deployment_url(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .map(|token| token.trim_end_matches(['.', ',', ')', '"', '\'']))
        .find(|token| token.starts_with("https://") && token.contains(".pages.dev"))
        .map(str::to_string)
}

/// Last few lines, enough to show the error without the whole log.
fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> CloudflareCredentials {
        CloudflareCredentials {
            account_id: "acct".into(),
            api_token: "tok".into(),
        }
    }

    #[test]
    fn finds_url_in_wrangler_output() {
        let out = "Uploading... (3/3)\n✨ Success! Uploaded 3 files (1.2 sec)\n\n✨ Deployment complete! Take a peek over at https://ab12cd34.lp-habitlab-example-com.pages.dev\n";
        assert_eq!(
            parse_deployment_url(out).as_deref(),
            Some("https://ab12cd34.lp-habitlab-example-com.pages.dev")
        );
        assert_eq!(parse_deployment_url("no url here"), None);
    }

    #[test]
    fn network_failures_are_transient() {
        let err = classify_failure("", "✘ [ERROR] fetch failed\nECONNRESET");
        assert_eq!(err.kind, UploadErrorKind::Transient);

        let err = classify_failure("", "✘ [ERROR] Authentication error [code: 10000]");
        assert_eq!(err.kind, UploadErrorKind::Rejected);
        assert!(err.message.contains("Authentication error"));
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let tool = WranglerUploadTool::new(credentials())
            .with_program("/nonexistent/landing-genie-wrangler");
        let err = tool.deploy(Path::new("."), "lp-x").await.unwrap_err();
        assert_eq!(err.kind, UploadErrorKind::ToolMissing);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_with_restricted_environment() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let env_dump = dir.path().join("env.txt");
        let script = dir.path().join("fake-wrangler");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nenv > '{}'\necho \"Deployment complete! https://abc123.$5.pages.dev\"\n",
                env_dump.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tool = WranglerUploadTool::new(credentials()).with_program(&script);
        let url = tool.deploy(dir.path(), "lp-x-example-com").await.unwrap();
        assert_eq!(url, "https://abc123.lp-x-example-com.pages.dev");

        let env = std::fs::read_to_string(&env_dump).unwrap();
        assert!(env.contains("CLOUDFLARE_API_TOKEN=tok"));
        assert!(env.contains("CLOUDFLARE_ACCOUNT_ID=acct"));
        assert!(!env.contains("CARGO_MANIFEST_DIR"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-wrangler");
        std::fs::write(&script, "#!/bin/sh\necho 'Project not found' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tool = WranglerUploadTool::new(credentials()).with_program(&script);
        let err = tool.deploy(dir.path(), "lp-x").await.unwrap_err();
        assert_eq!(err.kind, UploadErrorKind::Rejected);
        assert_eq!(err.message, "Project not found");
    }
}
