//! Command-line arguments and one-shot maintenance commands.

use crate::config::{Config, MAX_PAGES_RANGE, PAGE_SIZE_RANGE, check_range};
use crate::data::vehicles::PgVehicleStore;
use crate::dealer::{DealerClient, scrape_listing};
use crate::dealer::listings::collect_active_urls;
use crate::scraper::batch::{ScanTracker, run_batch};
use crate::scraper::reconcile::Reconciler;
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "lotsync", version, about = "Dealer inventory sync service")]
pub struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,

    /// Run a single command instead of the long-running services
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Enumerate active listing URLs and print them as JSON
    Urls {
        #[arg(long, value_parser = page_size_arg)]
        limit: Option<u32>,
        #[arg(long, value_parser = max_pages_arg)]
        pages: Option<u32>,
    },
    /// Fetch and extract a single listing page
    Detail {
        #[arg(long)]
        url: String,
    },
    /// Run one full scan against the database and print the summary
    Refresh {
        #[arg(long, value_parser = page_size_arg)]
        limit: Option<u32>,
        #[arg(long, value_parser = max_pages_arg)]
        pages: Option<u32>,
    },
}

fn page_size_arg(raw: &str) -> Result<u32, String> {
    let value = raw.parse::<u32>().map_err(|e| format!("{e}"))?;
    check_range("limit", value, &PAGE_SIZE_RANGE)
}

fn max_pages_arg(raw: &str) -> Result<u32, String> {
    let value = raw.parse::<u32>().map_err(|e| format!("{e}"))?;
    check_range("pages", value, &MAX_PAGES_RANGE)
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    Pretty,
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceName {
    Web,
    Scraper,
}

impl ServiceName {
    pub fn all() -> Vec<ServiceName> {
        vec![ServiceName::Web, ServiceName::Scraper]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Web => "web",
            ServiceName::Scraper => "scraper",
        }
    }
}

/// Execute a one-shot command and print its JSON result to stdout.
pub async fn run_command(command: Command, config: &Config) -> anyhow::Result<()> {
    let dealer = DealerClient::new(config.dealer_base_url()?)?;

    match command {
        Command::Urls { limit, pages } => {
            let options = config.scan_options_with(limit, pages);
            let urls = collect_active_urls(&dealer, &options.enumerate).await?;
            let sample: Vec<&String> = urls.iter().take(5).collect();
            let out = json!({ "total": urls.len(), "sample": sample, "all": urls });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Detail { url } => {
            let candidate = scrape_listing(&dealer, &url)
                .await
                .with_context(|| format!("Failed to scrape {url}"))?;
            println!("{}", serde_json::to_string_pretty(&candidate)?);

            let missing = candidate.missing_title_fields();
            if !missing.is_empty() {
                eprintln!("Note: missing fields: {}", missing.join(", "));
            }
        }
        Command::Refresh { limit, pages } => {
            let pool = crate::app::connect_database(config).await?;
            let reconciler = Reconciler::new(Arc::new(PgVehicleStore::new(pool)));
            let options = config.scan_options_with(limit, pages);
            let summary = run_batch(&dealer, &reconciler, &options, &ScanTracker::default())
                .await
                .context("Scan failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
