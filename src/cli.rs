//! Command-line interface definitions for gov_feed.
//!
//! Every option can also be given through an environment variable.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Serve RSS feeds for government portal listing pages.
///
/// # Examples
///
/// ```sh
/// # Serve the built-in Ankang feed on the default address
/// gov_feed
///
/// # Serve extra portals from a descriptor file
/// gov_feed --listen 0.0.0.0:8080 --sites sites.example.yaml
///
/// # Render one feed to stdout and exit
/// gov_feed --print ankang-gov:2
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Address the HTTP server binds to
    #[arg(short, long, env = "FEED_LISTEN", default_value = "127.0.0.1:1200")]
    pub listen: SocketAddr,

    /// Whole-request timeout for upstream pages, in seconds
    #[arg(short, long, env = "FEED_TIMEOUT_SECS", default_value_t = crate::fetch::DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,

    /// Optional YAML file with additional site descriptors
    #[arg(short, long, env = "FEED_SITES")]
    pub sites: Option<PathBuf>,

    /// Render the feed of `<site>:<node_id>` to stdout instead of serving
    #[arg(short, long, value_name = "SITE:NODE_ID", value_parser = parse_print_target)]
    pub print: Option<PrintTarget>,
}

/// A one-shot render request from `--print`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintTarget {
    pub site: String,
    pub node_id: String,
}

fn parse_print_target(s: &str) -> Result<PrintTarget, String> {
    match s.split_once(':') {
        Some((site, node_id)) if !site.is_empty() && !node_id.is_empty() => Ok(PrintTarget {
            site: site.to_string(),
            node_id: node_id.to_string(),
        }),
        _ => Err(format!("expected <site>:<node_id>, got {s:?}")),
    }
}
