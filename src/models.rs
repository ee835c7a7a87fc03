//! Data models for scraped listings and the feeds rendered from them.
//!
//! This module defines the values that flow through one request:
//! - [`RawItemRecord`] and [`PageExtract`]: what the streaming extractor saw
//! - [`FeedItem`], [`ChannelMeta`], [`FeedDocument`]: what the renderer writes
//! - [`Enclosure`] and [`SourceRef`]: per-site constants attached to each item
//!
//! Everything here is request-scoped. Nothing is cached between requests.

use serde::{Deserialize, Serialize};

/// One listing entry as found in the page, before normalization.
///
/// Every field is optional: an absent sub-element is recorded as `None` and
/// resolved to its default by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItemRecord {
    /// Text of the item title element.
    pub title_text: Option<String>,
    /// Text of the first link inside the item.
    pub link_text: Option<String>,
    /// `href` of the first link inside the item, as written in the page.
    pub href_raw: Option<String>,
    /// Text of the date element.
    pub date_text: Option<String>,
    /// Text of the description element.
    pub desc_text: Option<String>,
}

/// Page-level metadata plus the listing entries, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtract {
    pub page_title: Option<String>,
    pub page_description: Option<String>,
    pub items: Vec<RawItemRecord>,
}

/// An RSS `<enclosure>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: String,
    #[serde(default)]
    pub length: u64,
}

/// An RSS `<source>`: the channel the item came from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
}

/// A normalized feed entry, ready to render.
///
/// `link` is always absolute and `guid` equals `link`; the portal never reuses
/// article paths, so the link is a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// RFC 2822 style, e.g. `Thu, 20 Mar 2025 00:00:00 GMT`.
    pub pub_date: String,
    pub guid: String,
    pub author: String,
    pub category: String,
    pub enclosure: Enclosure,
    pub source: SourceRef,
}

/// The `<channel>` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMeta {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    pub category: String,
}

/// A complete feed. `items` is never empty once assembled by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub channel: ChannelMeta,
    pub items: Vec<FeedItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_item_defaults_to_all_absent() {
        let raw = RawItemRecord::default();
        assert!(raw.title_text.is_none());
        assert!(raw.href_raw.is_none());
        assert!(raw.date_text.is_none());
        assert!(raw.desc_text.is_none());
    }

    #[test]
    fn test_enclosure_length_defaults_to_zero() {
        let yaml = "url: https://www.ankang.gov.cn/favicon.ico\nmime_type: image/x-icon\n";
        let enclosure: Enclosure = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(enclosure.length, 0);
        assert_eq!(enclosure.mime_type, "image/x-icon");
    }
}
