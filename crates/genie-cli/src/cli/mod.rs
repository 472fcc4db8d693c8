//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "landing-genie",
    bin_name = "landing-genie",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Deploy generated landing pages and fill in their images",
    long_about = "landing-genie publishes a generated site to <slug>.<root-domain> \
                  on Cloudflare Pages and generates the images its pages reference.",
    after_help = "EXAMPLES:\n\
        \x20 landing-genie images habitlab --prompt \"A habit tracker for busy people\"\n\
        \x20 landing-genie deploy habitlab\n\
        \x20 landing-genie list --format json\n\
        \x20 landing-genie completions bash > /usr/share/bash-completion/completions/landing-genie",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Publish a site to its subdomain.
    #[command(
        about = "Deploy a site to <slug>.<root-domain>",
        after_help = "EXAMPLES:\n\
            \x20 landing-genie deploy habitlab\n\
            \x20 landing-genie deploy habitlab --no-verify\n\
            \x20 ROOT_DOMAIN=example.com landing-genie deploy habitlab -v"
    )]
    Deploy(DeployArgs),

    /// Generate images for placeholder slots.
    #[command(
        visible_alias = "img",
        about = "Generate missing or placeholder images",
        after_help = "EXAMPLES:\n\
            \x20 landing-genie images habitlab\n\
            \x20 landing-genie images habitlab --dry-run\n\
            \x20 landing-genie images habitlab --overwrite --workers 2"
    )]
    Images(ImagesArgs),

    /// List local sites.
    #[command(
        visible_alias = "ls",
        about = "List sites in the sites directory",
        after_help = "EXAMPLES:\n\
            \x20 landing-genie list\n\
            \x20 landing-genie list --format json\n\
            \x20 landing-genie --sites-dir ./out list"
    )]
    List(ListArgs),

    /// Write a starter configuration file.
    #[command(
        about = "Initialise configuration",
        after_help = "EXAMPLES:\n\
            \x20 landing-genie init           # user config directory\n\
            \x20 landing-genie init --local   # ./landing-genie.toml"
    )]
    Init(InitArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 landing-genie completions bash > ~/.local/share/bash-completion/completions/landing-genie\n\
            \x20 landing-genie completions zsh  > ~/.zfunc/_landing-genie\n\
            \x20 landing-genie completions fish > ~/.config/fish/completions/landing-genie.fish"
    )]
    Completions(CompletionsArgs),

    /// Inspect the effective configuration.
    #[command(
        about = "Configuration inspection",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 landing-genie config get deploy.upload_attempts\n\
            \x20 landing-genie config list\n\
            \x20 landing-genie config path"
    )]
    Config(ConfigCommands),
}

// ── deploy ────────────────────────────────────────────────────────────────────

/// Arguments for `landing-genie deploy`.
#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Site to deploy; a folder name under the sites directory.
    #[arg(value_name = "SLUG", help = "Site slug, e.g. habitlab")]
    pub slug: String,

    /// Skip polling the live hostname after the DNS step.
    #[arg(long = "no-verify", help = "Do not wait for the site to serve")]
    pub no_verify: bool,
}

// ── images ────────────────────────────────────────────────────────────────────

/// Arguments for `landing-genie images`.
#[derive(Debug, Args)]
pub struct ImagesArgs {
    /// Site whose pages are scanned.
    #[arg(value_name = "SLUG", help = "Site slug, e.g. habitlab")]
    pub slug: String,

    /// Regenerate images that already exist.
    #[arg(long = "overwrite", help = "Regenerate existing images too")]
    pub overwrite: bool,

    /// Product description added to every prompt.
    #[arg(
        short = 'p',
        long = "prompt",
        value_name = "TEXT",
        help = "Product description for the prompts"
    )]
    pub prompt: Option<String>,

    /// Show planned jobs and estimated cost without calling the provider.
    #[arg(long = "dry-run", help = "Plan and estimate cost only")]
    pub dry_run: bool,

    /// Ask for the product description when `--prompt` is not given.
    #[arg(
        short = 'i',
        long = "interactive",
        conflicts_with = "prompt",
        help = "Prompt for the product description"
    )]
    pub interactive: bool,

    /// Concurrent generation jobs. Overrides `images.workers`.
    #[arg(
        short = 'w',
        long = "workers",
        value_name = "N",
        value_parser = clap::value_parser!(u16).range(1..=32),
        help = "Concurrent generation jobs"
    )]
    pub workers: Option<u16>,
}

// ── list ──────────────────────────────────────────────────────────────────────

/// Arguments for `landing-genie list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Output format.
    #[arg(
        long = "format",
        value_enum,
        default_value = "table",
        help = "Output format"
    )]
    pub format: ListFormat,
}

/// Output format for the `list` command.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListFormat {
    /// Human-readable table.
    Table,
    /// One slug per line.
    List,
    /// JSON array.
    Json,
}

// ── init ──────────────────────────────────────────────────────────────────────

/// Arguments for `landing-genie init`.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Write to `./landing-genie.toml` instead of the user config directory.
    #[arg(
        long = "local",
        help = "Create local configuration in current directory"
    )]
    pub local: bool,

    /// Overwrite an existing config file.
    #[arg(short = 'f', long = "force", help = "Overwrite existing configuration")]
    pub force: bool,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `landing-genie completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── config subcommands ────────────────────────────────────────────────────────

/// Subcommands for `landing-genie config`.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value of a configuration key.
    Get {
        /// Dotted key path, e.g. `deploy.upload_attempts`.
        key: String,
    },
    /// Print all configuration values, secrets masked.
    List,
    /// Print the path `init` writes to.
    Path,
}

// ── tests ─────────────────────────────────────────────────────────────────────
