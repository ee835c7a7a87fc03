//! # gov_feed
//!
//! Serves RSS 2.0 feeds for government portals that publish news listings
//! as HTML only. Each request fetches one listing page, extracts its entries
//! with a streaming HTML tokenizer and renders them as a feed.
//!
//! ## Usage
//!
//! ```sh
//! gov_feed                              # GET /ankang/gov/{node_id} on 127.0.0.1:1200
//! gov_feed --sites sites.example.yaml   # plus the portals described in the file
//! gov_feed --print ankang-gov:2         # one feed to stdout
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching** (`fetch`): download the listing page with browser headers
//! 2. **Extracting** (`extract`): stream the body through html5ever, matching
//!    the site's selectors as tokens arrive
//! 3. **Normalizing** (`normalize`): resolve links, parse dates, fill defaults
//! 4. **Rendering** (`outputs::rss`): write the RSS document
//!
//! `pipeline` ties the stages together per request; `server` exposes them
//! over HTTP, one route per site descriptor (`sites`).

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod error;
mod extract;
mod fetch;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod server;
mod sites;
mod utils;

use cli::{Cli, PrintTarget};
use fetch::Fetcher;
use server::AppState;
use sites::Site;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "gov_feed starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let sites = sites::load_sites(args.sites.as_deref()).await.inspect_err(|e| {
        error!(error = %e, "Failed to load site descriptors");
    })?;
    let fetcher = Fetcher::new(Duration::from_secs(args.timeout_secs))?;

    if let Some(target) = args.print {
        return print_feed(&fetcher, &sites, &target).await;
    }

    let router = server::create_router(AppState { fetcher }, &sites);
    server::run_server(args.listen, router).await?;
    Ok(())
}

/// Render one feed to stdout. Fails when the site is unknown or the feed
/// could not be built.
async fn print_feed(fetcher: &Fetcher, sites: &[std::sync::Arc<Site>], target: &PrintTarget) -> Result<(), Box<dyn Error>> {
    let Some(site) = sites.iter().find(|s| s.adapter.name == target.site) else {
        let known: Vec<_> = sites.iter().map(|s| s.adapter.name.as_str()).collect();
        error!(site = %target.site, ?known, "Unknown site");
        return Err(format!("unknown site {:?}", target.site).into());
    };

    let feed = pipeline::handle(fetcher, site, &target.node_id).await;
    if feed.status != 200 {
        return Err(feed.body.into());
    }

    let mut stdout = tokio::io::stdout();
    stdout.write_all(feed.body.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
