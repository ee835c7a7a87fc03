//! Site descriptors: everything that differs between portals, as data.
//!
//! A [`SiteAdapter`] names the route a feed is served under, the portal's
//! origin and listing URL template, the selectors that locate listing entries
//! and the constants stamped on every item. Supporting another portal with the
//! same kind of listing page means adding a descriptor, either as a built-in
//! module like [`ankang`] or in a YAML file passed with `--sites`.
//!
//! # YAML format
//!
//! ```yaml
//! - name: example-gov
//!   route: /example/gov
//!   origin: https://www.example.gov.cn
//!   target_path: /col/{node_id}/index.html
//!   failure_message: 页面请求失败
//!   utc_offset_hours: 8
//!   selectors:            # optional, defaults shown in SelectorMap::default
//!     item: .news-item
//!   channel: { title: ..., description: ..., language: zh-cn, category: example-gov }
//!   item:
//!     author: ...
//!     category: ...
//!     untitled: 无标题
//!     title_from_link_text: false   # optional
//!     empty_title: 暂无政务信息
//!     empty_description: 该栏目暂无公开的政务信息
//!     enclosure: { url: https://www.example.gov.cn/favicon.ico, mime_type: image/x-icon }
//!     source: { title: ..., url: https://www.example.gov.cn }
//! ```

pub mod ankang;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};
use url::Url;

use crate::error::{FeedError, Result};
use crate::extract::CompiledSelectors;
use crate::models::{Enclosure, SourceRef};

/// Placeholder in [`SiteAdapter::target_path`] replaced by the requested node.
pub const NODE_ID_PLACEHOLDER: &str = "{node_id}";

/// Declarative description of one portal's listing pages.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SiteAdapter {
    /// Short unique name, used in logs and by `--print`.
    pub name: String,
    /// Route prefix; the feed is served at `{route}/{node_id}`.
    pub route: String,
    /// Scheme and host, without a trailing slash.
    pub origin: String,
    /// Listing path relative to the origin, containing `{node_id}`.
    pub target_path: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Offset applied to listing times that carry no zone, within `-23..=23`.
    #[serde(default)]
    pub utc_offset_hours: i32,
    /// Start of the plain-text body returned when the portal fails; the
    /// status code (or the transport error) is appended.
    pub failure_message: String,
    #[serde(default)]
    pub selectors: SelectorMap,
    pub channel: ChannelDefaults,
    pub item: ItemDefaults,
}

fn default_accept_language() -> String {
    "zh-CN,zh;q=0.9".to_string()
}

/// Selector strings, one per extracted field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorMap {
    pub page_title: String,
    pub page_description: String,
    /// Attribute of the description element holding the text.
    pub page_description_attr: String,
    /// Container of one listing entry.
    pub item: String,
    pub item_title: String,
    pub item_link: String,
    pub item_date: String,
    pub item_description: String,
}

impl Default for SelectorMap {
    fn default() -> Self {
        Self {
            page_title: "title".to_string(),
            page_description: r#"meta[name="description"]"#.to_string(),
            page_description_attr: "content".to_string(),
            item: ".list-li".to_string(),
            item_title: ".list-title".to_string(),
            item_link: "a".to_string(),
            item_date: ".list-time".to_string(),
            item_description: ".list-desc".to_string(),
        }
    }
}

/// Channel values used when the page provides none.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChannelDefaults {
    pub title: String,
    pub description: String,
    pub language: String,
    pub category: String,
}

/// Constants attached to every item, and the placeholder texts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ItemDefaults {
    pub author: String,
    pub category: String,
    /// Title used when an entry has no title text.
    pub untitled: String,
    /// Use the link text as the title when the title element is missing or
    /// empty, before falling back to `untitled`.
    #[serde(default)]
    pub title_from_link_text: bool,
    /// Title of the placeholder item of an empty listing.
    pub empty_title: String,
    /// Description of the placeholder item of an empty listing.
    pub empty_description: String,
    pub enclosure: Enclosure,
    pub source: SourceRef,
}

/// A validated adapter with its selectors compiled.
#[derive(Debug)]
pub struct Site {
    pub adapter: SiteAdapter,
    pub selectors: Arc<CompiledSelectors>,
}

impl Site {
    pub fn new(mut adapter: SiteAdapter) -> Result<Self> {
        let fail = |reason: String| FeedError::Config {
            site: adapter.name.clone(),
            reason,
        };

        if adapter.name.trim().is_empty() {
            return Err(fail("name is empty".to_string()));
        }

        let origin = Url::parse(&adapter.origin).map_err(|e| fail(format!("origin: {e}")))?;
        if !matches!(origin.scheme(), "http" | "https") || origin.host_str().is_none() {
            return Err(fail("origin must be an http(s) URL with a host".to_string()));
        }
        if origin.path() != "/" || origin.query().is_some() {
            return Err(fail("origin must not carry a path or query".to_string()));
        }

        let route = &adapter.route;
        if !route.starts_with('/') || route.ends_with('/') || route.contains(['{', '}', '*']) {
            return Err(fail(format!("route {route:?} must look like /a/b")));
        }
        if !adapter.target_path.starts_with('/') || !adapter.target_path.contains(NODE_ID_PLACEHOLDER) {
            return Err(fail(format!(
                "target_path must start with '/' and contain {NODE_ID_PLACEHOLDER}"
            )));
        }

        if !(-23..=23).contains(&adapter.utc_offset_hours) {
            return Err(fail(format!(
                "utc_offset_hours {} is outside -23..=23",
                adapter.utc_offset_hours
            )));
        }

        let selectors = CompiledSelectors::compile(&adapter.selectors)?;
        adapter.origin = adapter.origin.trim_end_matches('/').to_string();

        Ok(Self {
            adapter,
            selectors: Arc::new(selectors),
        })
    }

    /// Listing URL for one node, e.g. `https://www.ankang.gov.cn/Node-2.html`.
    pub fn target_url(&self, node_id: &str) -> String {
        let path = self
            .adapter
            .target_path
            .replace(NODE_ID_PLACEHOLDER, &urlencoding::encode(node_id));
        format!("{}{}", self.adapter.origin, path)
    }

    /// Axum route pattern, e.g. `/ankang/gov/{node_id}`.
    pub fn route_pattern(&self) -> String {
        format!("{}/{}", self.adapter.route, NODE_ID_PLACEHOLDER)
    }

    pub fn origin(&self) -> &str {
        &self.adapter.origin
    }
}

/// Parse a YAML list of adapters.
pub fn parse_adapters(yaml: &str) -> Result<Vec<SiteAdapter>> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// The built-in adapters plus those in `extra`, validated.
///
/// # Arguments
///
/// * `extra` - Optional YAML file holding a list of [`SiteAdapter`]s
///
/// # Returns
///
/// One [`Site`] per adapter, built-in Ankang first.
///
/// # Errors
///
/// - [`FeedError::Io`] if the file cannot be read
/// - [`FeedError::Yaml`] if it is not a list of adapters
/// - [`FeedError::Config`] or [`FeedError::Selector`] if a descriptor is
///   invalid, or a name or route is used twice
#[instrument(level = "info", skip_all, fields(extra = ?extra))]
pub async fn load_sites(extra: Option<&Path>) -> Result<Vec<Arc<Site>>> {
    let mut adapters = vec![ankang::adapter()];
    if let Some(path) = extra {
        let yaml = tokio::fs::read_to_string(path).await?;
        adapters.extend(parse_adapters(&yaml)?);
    }
    build_sites(adapters)
}

pub fn build_sites(adapters: Vec<SiteAdapter>) -> Result<Vec<Arc<Site>>> {
    let mut names = HashSet::new();
    let mut routes = HashSet::new();
    let mut sites = Vec::with_capacity(adapters.len());

    for adapter in adapters {
        if !names.insert(adapter.name.clone()) {
            return Err(FeedError::Config {
                site: adapter.name,
                reason: "duplicate name".to_string(),
            });
        }
        if !routes.insert(adapter.route.clone()) {
            return Err(FeedError::Config {
                reason: format!("duplicate route {}", adapter.route),
                site: adapter.name,
            });
        }
        let site = Site::new(adapter)?;
        info!(site = %site.adapter.name, route = %site.route_pattern(), origin = %site.origin(), "Loaded site");
        sites.push(Arc::new(site));
    }
    Ok(sites)
}
