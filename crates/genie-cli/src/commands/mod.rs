//! Command handlers, one module per subcommand.

pub mod completions;
pub mod config;
pub mod deploy;
pub mod images;
pub mod init;
pub mod list;

use genie_adapters::LocalSiteStore;
use genie_core::{domain::Slug, error::GenieError};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    config::AppConfig,
    error::{CliResult, IntoCli},
};

/// Multi-thread runtime for the async commands.
pub(crate) fn runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("landing-genie")
        .build()
        .with_cli_context(|| "Failed to start the async runtime")
}

/// Cancel `token` on the first Ctrl-C.  Must be called inside the runtime.
pub(crate) fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, finishing the current step");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    });
}

/// Validate `raw` and open the sites directory.
///
/// Runs before any credentials are required so a typo fails fast. Layout
/// repair happens later, under the site lock.
pub(crate) fn prepare_site(raw: &str, config: &AppConfig) -> CliResult<(Slug, LocalSiteStore)> {
    let slug = Slug::parse(raw).map_err(GenieError::from)?;
    Ok((slug, LocalSiteStore::new(config.sites_dir())))
}
