//! End-to-end tests for the `landing-genie` binary.
//!
//! Every command runs against a temporary sites directory and an explicit
//! config file, with the well-known credential variables removed, so the
//! developer's own environment never leaks in.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo;
use predicates::prelude::*;
use tempfile::TempDir;

const WELL_KNOWN: [&str; 7] = [
    "ROOT_DOMAIN",
    "CLOUDFLARE_ACCOUNT_ID",
    "CLOUDFLARE_API_TOKEN",
    "GEMINI_API_KEY",
    "GEMINI_IMAGE_MODEL",
    "GEMINI_IMAGE_COST_PER_1K_TOKENS",
    "GEMINI_IMAGE_COST_PER_1M_TOKENS",
];

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "").unwrap();
    fs::create_dir_all(dir.path().join("sites")).unwrap();
    dir
}

fn add_site(root: &Path, slug: &str, html: &str) {
    let site = root.join("sites").join(slug);
    fs::create_dir_all(site.join("assets")).unwrap();
    fs::write(site.join("index.html"), html).unwrap();
}

fn genie(dir: &TempDir) -> Command {
    let mut cmd = cargo::cargo_bin_cmd!("landing-genie");
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .arg("--sites-dir")
        .arg(dir.path().join("sites"))
        .env("NO_COLOR", "1");
    for var in WELL_KNOWN {
        cmd.env_remove(var);
    }
    cmd
}

// ── basics ───────────────────────────────────────────────────────────────────

#[test]
fn help_lists_commands() {
    let dir = workspace();
    genie(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("images"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn version_flag() {
    let dir = workspace();
    genie(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn quiet_and_verbose_conflict() {
    let dir = workspace();
    genie(&dir).args(["-q", "-v", "list"]).assert().code(2);
}

#[test]
fn unreadable_config_file_exits_4() {
    let dir = workspace();
    fs::write(dir.path().join("config.toml"), "sites_dir = [").unwrap();
    genie(&dir).arg("list").assert().code(4);
}

// ── deploy ───────────────────────────────────────────────────────────────────

#[test]
fn deploy_rejects_invalid_slug() {
    let dir = workspace();
    genie(&dir)
        .args(["deploy", "Bad_Slug"])
        .env("ROOT_DOMAIN", "example.com")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid slug 'Bad_Slug'"));
}

#[test]
fn deploy_without_root_domain_exits_4() {
    let dir = workspace();
    add_site(dir.path(), "habitlab", "<html></html>");
    genie(&dir)
        .args(["deploy", "habitlab"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("ROOT_DOMAIN"));
}

#[test]
fn deploy_without_cloudflare_credentials_exits_4() {
    let dir = workspace();
    add_site(dir.path(), "habitlab", "<html></html>");
    genie(&dir)
        .args(["deploy", "habitlab"])
        .env("ROOT_DOMAIN", "example.com")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("CLOUDFLARE_ACCOUNT_ID"));
}

#[test]
fn deploy_of_missing_site_exits_2_before_any_remote_call() {
    let dir = workspace();
    genie(&dir)
        .args(["deploy", "nowhere"])
        .env("ROOT_DOMAIN", "example.com")
        .env("CLOUDFLARE_ACCOUNT_ID", "acc")
        .env("CLOUDFLARE_API_TOKEN", "token")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}

// ── images ───────────────────────────────────────────────────────────────────

const PAGE: &str = r#"<html><body>
  <section class="hero"><img src="assets/hero.png" alt="Hero"></section>
  <img src="assets/logo.png" alt="Logo">
</body></html>"#;

#[test]
fn images_dry_run_plans_without_credentials() {
    let dir = workspace();
    add_site(dir.path(), "habitlab", PAGE);
    fs::write(dir.path().join("sites/habitlab/assets/logo.png"), b"logo").unwrap();

    let output = genie(&dir)
        .args(["--output-format", "json", "images", "habitlab", "--dry-run"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["summary"]["planned"], 1);
    assert_eq!(report["summary"]["skipped"], 1);
    assert_eq!(report["slots"]["assets/hero.png"]["tier"], "2K");
    assert!(!dir.path().join("sites/habitlab/assets/hero.png").exists());
}

#[test]
fn images_without_api_key_exits_4() {
    let dir = workspace();
    add_site(dir.path(), "habitlab", PAGE);
    genie(&dir)
        .args(["images", "habitlab"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

#[test]
fn images_of_missing_site_exits_2() {
    let dir = workspace();
    genie(&dir)
        .args(["images", "nowhere", "--dry-run"])
        .assert()
        .code(2);
}

#[test]
fn images_flattens_nested_layout() {
    let dir = workspace();
    let nested = dir.path().join("sites/habitlab/sites/habitlab");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("index.html"), PAGE).unwrap();

    genie(&dir)
        .args(["images", "habitlab", "--dry-run"])
        .assert()
        .success();
    assert!(dir.path().join("sites/habitlab/index.html").is_file());
    assert!(!dir.path().join("sites/habitlab/sites").exists());
}

// ── list ─────────────────────────────────────────────────────────────────────

#[test]
fn list_json_is_sorted_and_named() {
    let dir = workspace();
    add_site(dir.path(), "zeta", "<html></html>");
    add_site(dir.path(), "alpha", "<html></html>");

    let output = genie(&dir)
        .args(["list", "--format", "json"])
        .env("ROOT_DOMAIN", "example.com")
        .output()
        .unwrap();
    assert!(output.status.success());

    let sites: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let sites = sites.as_array().unwrap();
    assert_eq!(sites.len(), 2);
    assert_eq!(sites[0]["slug"], "alpha");
    assert_eq!(sites[1]["slug"], "zeta");
    assert_eq!(sites[1]["names"]["fqdn"], "zeta.example.com");
    assert_eq!(sites[1]["html_files"], 1);
}

#[test]
fn list_plain_prints_one_slug_per_line() {
    let dir = workspace();
    add_site(dir.path(), "habitlab", "<html></html>");
    genie(&dir)
        .args(["list", "--format", "list"])
        .assert()
        .success()
        .stdout("habitlab\n");
}

#[test]
fn list_of_missing_sites_dir_is_empty() {
    let dir = workspace();
    fs::remove_dir(dir.path().join("sites")).unwrap();
    genie(&dir)
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

// ── config / init / completions ──────────────────────────────────────────────

#[test]
fn config_get_reads_file_and_env() {
    let dir = workspace();
    fs::write(
        dir.path().join("config.toml"),
        "[deploy]\nupload_attempts = 5\n",
    )
    .unwrap();

    genie(&dir)
        .args(["config", "get", "deploy.upload_attempts"])
        .assert()
        .success()
        .stdout("5\n");

    genie(&dir)
        .args(["config", "get", "root_domain"])
        .env("ROOT_DOMAIN", "example.com")
        .assert()
        .success()
        .stdout("example.com\n");
}

#[test]
fn config_list_masks_secrets() {
    let dir = workspace();
    genie(&dir)
        .args(["config", "list"])
        .env("GEMINI_API_KEY", "super-secret-key")
        .assert()
        .success()
        .stdout(predicate::str::contains("super-secret-key").not())
        .stdout(predicate::str::contains("********"));
}

#[test]
fn cost_per_thousand_tokens_is_read_from_env() {
    let dir = workspace();
    genie(&dir)
        .args(["config", "get", "gemini.cost_per_million_tokens"])
        .env("GEMINI_IMAGE_COST_PER_1K_TOKENS", "0.5")
        .assert()
        .success()
        .stdout("500.0\n");
}

#[test]
fn config_get_unknown_key_exits_4() {
    let dir = workspace();
    genie(&dir)
        .args(["config", "get", "no.such.key"])
        .assert()
        .code(4);
}

#[test]
fn init_local_does_not_clobber_without_force() {
    let dir = workspace();
    genie(&dir).args(["init", "--local"]).assert().success();

    let path = dir.path().join("landing-genie.toml");
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("[deploy]"));

    fs::write(&path, "# mine\n").unwrap();
    genie(&dir).args(["init", "--local"]).assert().success();
    assert_eq!(fs::read_to_string(&path).unwrap(), "# mine\n");

    genie(&dir).args(["init", "--local", "--force"]).assert().success();
    assert!(fs::read_to_string(&path).unwrap().contains("[images]"));
}

#[test]
fn completions_for_bash() {
    let dir = workspace();
    genie(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("landing-genie"));
}
