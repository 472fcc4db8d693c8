//! Flags accepted by every `landing-genie` subcommand.
//!
//! Flattened into [`super::Cli`]; all of them are `global = true`, so they may
//! appear before or after the subcommand name.

use clap::Args;
use std::path::PathBuf;

/// Logging, output and path flags shared by all commands.
#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    /// Log level counter: `-v` info, `-vv` debug, `-vvv` trace.
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase verbosity (-v, -vv, -vvv)",
        long_help = "Increase logging verbosity:
    (none)  - Only warnings and errors
    -v      - Info level (stage transitions, retries)
    -vv     - Debug level (API calls, probes)
    -vvv    - Trace level (very verbose)"
    )]
    pub verbose: u8,

    /// Only errors reach the terminal.
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose",
        help = "Suppress non-error output"
    )]
    pub quiet: bool,

    /// Plain text only. Also set by `NO_COLOR`.
    #[arg(
        long = "no-color",
        global = true,
        env = "NO_COLOR",
        help = "Disable colored output"
    )]
    pub no_color: bool,

    /// Explicit config file; it must exist.
    #[arg(
        short = 'c',
        long = "config",
        global = true,
        value_name = "FILE",
        help = "Configuration file path"
    )]
    pub config: Option<PathBuf>,

    /// Directory holding one folder per site. Overrides `sites_dir`.
    #[arg(
        long = "sites-dir",
        global = true,
        value_name = "DIR",
        help = "Sites directory (default: ./sites)"
    )]
    pub sites_dir: Option<PathBuf>,

    /// Also write logs, without colour, to this file.
    #[arg(
        long = "log-file",
        global = true,
        value_name = "FILE",
        help = "Append logs to a file"
    )]
    pub log_file: Option<PathBuf>,

    /// `json` prints reports for scripts; `auto` picks human on a TTY.
    #[arg(
        long = "output-format",
        global = true,
        value_enum,
        default_value = "auto",
        help = "Output format"
    )]
    pub output_format: OutputFormat,
}

/// How the CLI should render its output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Auto,
    /// Colours, spinners and progress bars.
    Human,
    Plain,
    /// Reports as pretty-printed JSON on stdout.
    Json,
}
