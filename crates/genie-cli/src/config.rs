//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value.  The
//! CLI layer owns config; the core crate only sees the run settings and
//! credentials derived from it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. Well-known variables: `ROOT_DOMAIN`, `CLOUDFLARE_ACCOUNT_ID`,
//!    `CLOUDFLARE_API_TOKEN`, `GEMINI_API_KEY`, `GEMINI_IMAGE_MODEL`,
//!    `GEMINI_IMAGE_COST_PER_1K_TOKENS` (or `_PER_1M_TOKENS`)
//! 3. `LANDING_GENIE__SECTION__KEY` variables
//! 4. Config file (`--config`, else `./landing-genie.toml`, else the user
//!    config directory)
//! 5. Built-in defaults (always present)

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use genie_adapters::{CloudflareCredentials, GeminiCredentials, generation::DEFAULT_MODEL};
use genie_core::{
    application::{DeployConfig, PipelineConfig},
    domain::{PricingTable, ResolutionTier, RootDomain, ScanRules},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CliError, CliResult};

pub const LOCAL_CONFIG_FILE: &str = "landing-genie.toml";

const REDACTED: &str = "********";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding one sub-directory per site.
    pub sites_dir: PathBuf,
    /// Zone that site subdomains are created under, e.g. `example.com`.
    pub root_domain: Option<String>,
    pub cloudflare: CloudflareSettings,
    pub deploy: DeploySettings,
    pub gemini: GeminiSettings,
    pub images: ImagesSettings,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudflareSettings {
    pub account_id: Option<String>,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    pub upload_attempts: u32,
    pub retry_base_delay_secs: u64,
    pub retry_max_delay_secs: u64,
    pub upload_timeout_secs: u64,
    pub api_timeout_secs: u64,
    /// Zero skips the post-deploy check.
    pub verify_timeout_secs: u64,
    pub verify_interval_secs: u64,
    pub wrangler_bin: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    /// Price used when the model is not in the built-in table.
    pub cost_per_million_tokens: Option<f64>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesSettings {
    pub workers: usize,
    /// Zero disables the shared request budget.
    pub requests_per_minute: u32,
    pub generation_attempts: u32,
    pub retry_base_delay_secs: u64,
    pub assets_dir: String,
    pub default_tier: String,
    pub hero_tier: String,
    /// Product description appended to every prompt unless `--prompt` is given.
    pub product_context: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub no_color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sites_dir: PathBuf::from("sites"),
            root_domain: None,
            cloudflare: CloudflareSettings::default(),
            deploy: DeploySettings::default(),
            gemini: GeminiSettings::default(),
            images: ImagesSettings::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            upload_attempts: 3,
            retry_base_delay_secs: 2,
            retry_max_delay_secs: 30,
            upload_timeout_secs: 300,
            api_timeout_secs: 30,
            verify_timeout_secs: 60,
            verify_interval_secs: 5,
            wrangler_bin: None,
        }
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            cost_per_million_tokens: None,
            request_timeout_secs: 120,
        }
    }
}

impl Default for ImagesSettings {
    fn default() -> Self {
        let scan = ScanRules::default();
        Self {
            workers: 4,
            requests_per_minute: 10,
            generation_attempts: 3,
            retry_base_delay_secs: 2,
            assets_dir: scan.assets_dir,
            default_tier: scan.default_tier.to_string(),
            hero_tier: scan.hero_tier.to_string(),
            product_context: None,
        }
    }
}

impl AppConfig {
    /// Load configuration, starting from defaults.
    pub fn load(config_file: Option<&PathBuf>) -> anyhow::Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match config_file {
            Some(path) => {
                builder = builder.add_source(File::from(path.as_path()).required(true));
            }
            None => {
                for path in Self::search_paths() {
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("LANDING_GENIE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        for (key, var) in [
            ("root_domain", "ROOT_DOMAIN"),
            ("cloudflare.account_id", "CLOUDFLARE_ACCOUNT_ID"),
            ("cloudflare.api_token", "CLOUDFLARE_API_TOKEN"),
            ("gemini.api_key", "GEMINI_API_KEY"),
            ("gemini.model", "GEMINI_IMAGE_MODEL"),
        ] {
            builder = builder.set_override_option(key, non_empty_env(var))?;
        }
        // The per-million variable wins when both are set.
        for (var, tokens) in [
            ("GEMINI_IMAGE_COST_PER_1K_TOKENS", 1_000.0),
            ("GEMINI_IMAGE_COST_PER_1M_TOKENS", 1_000_000.0),
        ] {
            if let Some(raw) = non_empty_env(var) {
                let cost = price_per_million(var, &raw, tokens)?;
                builder = builder.set_override("gemini.cost_per_million_tokens", cost)?;
            }
        }

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Path `init` writes to and `config path` reports.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `./landing-genie.toml`.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "landing-genie", "landing-genie")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE))
    }

    /// Files consulted when `--config` is absent, lowest priority first.
    fn search_paths() -> Vec<PathBuf> {
        vec![Self::config_path(), PathBuf::from(LOCAL_CONFIG_FILE)]
    }

    pub fn with_sites_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.sites_dir = dir;
        }
        self
    }

    pub fn sites_dir(&self) -> &Path {
        &self.sites_dir
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.sites_dir.join(".locks")
    }

    pub fn root_domain(&self) -> CliResult<RootDomain> {
        let raw = self.root_domain.as_deref().ok_or(CliError::MissingSetting {
            key: "root_domain",
            env: "ROOT_DOMAIN",
        })?;
        RootDomain::parse(raw).map_err(|e| CliError::Core(e.into()))
    }

    pub fn cloudflare_credentials(&self) -> CliResult<CloudflareCredentials> {
        let account_id = required(&self.cloudflare.account_id, "cloudflare.account_id", "CLOUDFLARE_ACCOUNT_ID")?;
        let api_token = required(&self.cloudflare.api_token, "cloudflare.api_token", "CLOUDFLARE_API_TOKEN")?;
        Ok(CloudflareCredentials {
            account_id,
            api_token,
        })
    }

    pub fn gemini_credentials(&self) -> CliResult<GeminiCredentials> {
        let api_key = required(&self.gemini.api_key, "gemini.api_key", "GEMINI_API_KEY")?;
        Ok(GeminiCredentials { api_key })
    }

    pub fn deploy_config(&self, root_domain: RootDomain) -> DeployConfig {
        let d = &self.deploy;
        DeployConfig {
            root_domain,
            upload_attempts: d.upload_attempts,
            retry_base_delay: Duration::from_secs(d.retry_base_delay_secs),
            retry_max_delay: Duration::from_secs(d.retry_max_delay_secs),
            upload_timeout: Duration::from_secs(d.upload_timeout_secs),
            platform_timeout: Duration::from_secs(d.api_timeout_secs),
            verify_timeout: Duration::from_secs(d.verify_timeout_secs),
            verify_interval: Duration::from_secs(d.verify_interval_secs.max(1)),
        }
    }

    pub fn pipeline_config(&self) -> CliResult<PipelineConfig> {
        let i = &self.images;
        let tier = |key: &'static str, raw: &str| -> CliResult<ResolutionTier> {
            raw.parse().map_err(|e| CliError::ConfigError {
                message: format!("images.{key}: {e}"),
                source: None,
            })
        };
        Ok(PipelineConfig {
            scan: ScanRules {
                assets_dir: i.assets_dir.trim_matches('/').to_string(),
                default_tier: tier("default_tier", &i.default_tier)?,
                hero_tier: tier("hero_tier", &i.hero_tier)?,
            },
            workers: i.workers.max(1),
            requests_per_minute: i.requests_per_minute,
            generation_attempts: i.generation_attempts,
            retry_base_delay: Duration::from_secs(i.retry_base_delay_secs),
            request_timeout: Duration::from_secs(self.gemini.request_timeout_secs),
            pricing: PricingTable::new(self.gemini.cost_per_million_tokens),
            ..PipelineConfig::default()
        })
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| REDACTED.to_string());
        let mut out = self.clone();
        out.cloudflare.api_token = mask(&self.cloudflare.api_token);
        out.gemini.api_key = mask(&self.gemini.api_key);
        out
    }

    /// Value at a dotted key such as `deploy.upload_attempts`, secrets masked.
    pub fn get(&self, key: &str) -> CliResult<String> {
        let tree = serde_json::to_value(self.redacted()).map_err(|e| CliError::ConfigError {
            message: format!("Failed to serialise config: {e}"),
            source: Some(Box::new(e)),
        })?;
        let value = key
            .split('.')
            .try_fold(&tree, |node, part| node.get(part))
            .ok_or_else(|| CliError::ConfigError {
                message: format!("Unknown config key: '{key}'"),
                source: None,
            })?;
        Ok(match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Parse a price quoted per `tokens` tokens into a price per million tokens.
fn price_per_million(var: &str, raw: &str, tokens: f64) -> anyhow::Result<f64> {
    let price: f64 = raw
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{var}={raw:?}: {e}"))?;
    if !price.is_finite() || price < 0.0 {
        anyhow::bail!("{var}={raw:?}: must be a non-negative number");
    }
    Ok(price * (1_000_000.0 / tokens))
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn required(value: &Option<String>, key: &'static str, env: &'static str) -> CliResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(CliError::MissingSetting { key, env })
}
