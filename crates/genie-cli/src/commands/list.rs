//! Implementation of the `landing-genie list` command.

use std::sync::Arc;

use genie_adapters::LocalSiteStore;
use genie_core::application::{SiteService, SiteSummary};

use crate::{
    cli::{ListArgs, ListFormat},
    config::AppConfig,
    error::CliResult,
    output::OutputManager,
};

pub fn execute(args: ListArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let service = SiteService::new(Arc::new(LocalSiteStore::new(config.sites_dir())));
    // Names are shown when a root domain is configured; listing never requires one.
    let root = config.root_domain().ok();
    let sites = service.list(root.as_ref())?;

    match args.format {
        ListFormat::Table => {
            if sites.is_empty() {
                output.info(&format!("No sites in {}", config.sites_dir().display()))?;
                return Ok(());
            }
            output.header(&format!("Sites in {}:", config.sites_dir().display()))?;
            for site in &sites {
                output.print(&table_row(site))?;
            }
        }

        // JSON and plain lists bypass quiet mode: they are meant for scripts.
        ListFormat::Json => output.json(&sites)?,

        ListFormat::List => {
            for site in &sites {
                println!("{}", site.slug);
            }
        }
    }

    Ok(())
}

fn table_row(site: &SiteSummary) -> String {
    let target = site
        .names
        .as_ref()
        .map(|n| format!("  -> https://{}", n.fqdn))
        .unwrap_or_default();
    format!(
        "  {:<24} {:>4} files {:>3} pages {:>10} bytes{target}",
        site.slug.as_str(),
        site.files,
        site.html_files,
        site.bytes
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use genie_core::domain::{ResourceNames, Slug};

    #[test]
    fn table_row_shows_target_when_known() {
        let mut site = SiteSummary {
            slug: Slug::parse("habitlab").unwrap(),
            files: 3,
            html_files: 1,
            bytes: 2048,
            names: None,
        };
        assert!(!table_row(&site).contains("https://"));

        site.names = Some(ResourceNames {
            project_name: "lp-habitlab-example-com".into(),
            fqdn: "habitlab.example.com".into(),
            zone: "example.com".into(),
        });
        let row = table_row(&site);
        assert!(row.contains("habitlab"));
        assert!(row.ends_with("https://habitlab.example.com"));
    }
}
