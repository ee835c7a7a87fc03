//! Turn raw listing entries into feed items.
//!
//! Every field has a default, so normalization never fails:
//!
//! | Field | Source | Fallback |
//! |-------|--------|----------|
//! | title | item title text (then link text, if the site opts in) | site's "untitled" text |
//! | link / guid | `href`, resolved against the origin | the origin |
//! | pubDate | first `YYYY-MM-DD[ HH:MM[:SS]]` token | the current instant |
//! | description | item description text | the title |
//!
//! Author, category, enclosure and source are site constants.
//!
//! Date text without a `-`, or with a token that is not a real calendar date,
//! is replaced with the current instant. Publish dates in other formats are
//! lost this way; this matches what feed consumers of the portal already see.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::models::{FeedItem, RawItemRecord};
use crate::sites::SiteAdapter;

/// `pubDate` layout, e.g. `Thu, 20 Mar 2025 00:00:00 GMT`.
pub const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

static DATE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})(?:[ T](\d{1,2}):(\d{2})(?::(\d{2}))?)?")
        .expect("date token pattern is valid")
});

pub fn format_pub_date(instant: DateTime<Utc>) -> String {
    instant.format(PUB_DATE_FORMAT).to_string()
}

/// Normalizes entries for one site with a fixed notion of "now".
#[derive(Debug, Clone)]
pub struct Normalizer<'a> {
    site: &'a SiteAdapter,
    now: DateTime<Utc>,
}

impl<'a> Normalizer<'a> {
    pub fn new(site: &'a SiteAdapter) -> Self {
        Self::at(site, Utc::now())
    }

    /// A normalizer whose fallback date is `now`.
    pub fn at(site: &'a SiteAdapter, now: DateTime<Utc>) -> Self {
        Self { site, now }
    }

    pub fn normalize(&self, raw: RawItemRecord) -> FeedItem {
        let link_text = raw.link_text.as_deref().filter(|_| self.site.item.title_from_link_text);
        let title = non_empty(raw.title_text.as_deref())
            .or_else(|| non_empty(link_text))
            .unwrap_or(&self.site.item.untitled)
            .to_string();
        let link = resolve_link(&self.site.origin, raw.href_raw.as_deref());
        let pub_date = self.pub_date(raw.date_text.as_deref());
        let description = non_empty(raw.desc_text.as_deref()).unwrap_or(&title).to_string();

        self.item(title, link, description, pub_date)
    }

    /// The single item of an empty listing; it links to the listing itself.
    pub fn placeholder(&self, target_url: &str) -> FeedItem {
        self.item(
            self.site.item.empty_title.clone(),
            target_url.to_string(),
            self.site.item.empty_description.clone(),
            format_pub_date(self.now),
        )
    }

    fn item(&self, title: String, link: String, description: String, pub_date: String) -> FeedItem {
        let constants = &self.site.item;
        FeedItem {
            title,
            guid: link.clone(),
            link,
            description,
            pub_date,
            author: constants.author.clone(),
            category: constants.category.clone(),
            enclosure: constants.enclosure.clone(),
            source: constants.source.clone(),
        }
    }

    fn pub_date(&self, text: Option<&str>) -> String {
        let parsed = text
            .filter(|t| t.contains('-'))
            .and_then(|t| parse_listing_date(t, self.site.utc_offset_hours));
        if parsed.is_none() {
            debug!(text = ?text, "Unrecognized listing date; using current time");
        }
        format_pub_date(parsed.unwrap_or(self.now))
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// Resolve an `href` against `origin`.
///
/// Absolute http(s) links are kept verbatim; anything else is joined onto the
/// origin. Empty, unparseable and non-http results (`javascript:`, `mailto:`)
/// resolve to the origin so the item always has a usable link and guid.
pub fn resolve_link(origin: &str, href: Option<&str>) -> String {
    let Some(href) = non_empty(href) else {
        return origin.to_string();
    };

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return match Url::parse(href) {
            Ok(_) => href.to_string(),
            Err(_) => origin.to_string(),
        };
    }

    match Url::parse(origin).and_then(|base| base.join(href)) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url.to_string(),
        _ => origin.to_string(),
    }
}

/// Find and parse the first date (optionally date-time) token in `text`.
///
/// A bare date is taken as midnight UTC. A date-time is taken in the site's
/// local offset and converted to UTC.
pub fn parse_listing_date(text: &str, utc_offset_hours: i32) -> Option<DateTime<Utc>> {
    let caps = DATE_TOKEN.captures(text)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?;

    let Some(hour) = num(4) else {
        return date.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc());
    };
    let time = NaiveTime::from_hms_opt(hour, num(5)?, num(6).unwrap_or(0))?;
    let offset = FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?)?;
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
}
