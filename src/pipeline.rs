//! One feed request, end to end.
//!
//! ```text
//! Start ─▶ Fetching ─┬─▶ FetchFailed                      (500, text/plain)
//!                    └─▶ Extracting ─▶ Normalizing ─▶ Rendering ─▶ Done (200, xml)
//! ```
//!
//! The body is streamed into a blocking parse task through a bounded channel,
//! so parsing overlaps the download. Dropping the request future (client went
//! away) closes the channel and the parse task stops at the next chunk.

use futures::StreamExt;
use reqwest::Response;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{FeedError, Result};
use crate::extract::{CompiledSelectors, StreamingExtractor};
use crate::fetch::Fetcher;
use crate::models::{ChannelMeta, FeedDocument, PageExtract};
use crate::normalize::Normalizer;
use crate::outputs::rss;
use crate::sites::Site;

/// Chunks buffered between the download and the parse task.
const BODY_CHANNEL_DEPTH: usize = 16;

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Transport-independent response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl FeedResponse {
    fn xml(body: String) -> Self {
        Self {
            status: 200,
            content_type: rss::CONTENT_TYPE,
            body,
        }
    }

    fn failure(body: String) -> Self {
        Self {
            status: 500,
            content_type: TEXT_CONTENT_TYPE,
            body,
        }
    }
}

/// Serve the feed of `node_id` on `site`.
///
/// Never fails: errors become a 500 response whose plain-text body starts
/// with the site's failure message (see [`failure_message`]).
#[instrument(level = "info", skip(fetcher, site), fields(site = %site.adapter.name))]
pub async fn handle(fetcher: &Fetcher, site: &Site, node_id: &str) -> FeedResponse {
    let t0 = Instant::now();
    let target_url = site.target_url(node_id);

    let doc = match build_feed(fetcher, site, &target_url).await {
        Ok(doc) => doc,
        Err(e) => {
            error!(url = %target_url, error = %e, "Feed request failed");
            return FeedResponse::failure(failure_message(site, &e));
        }
    };

    match rss::render(&doc) {
        Ok(xml) => {
            info!(
                url = %target_url,
                items = doc.items.len(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Served feed"
            );
            FeedResponse::xml(xml)
        }
        Err(e) => {
            error!(error = %e, "Rendering failed");
            FeedResponse::failure(format!("{}：{}", site.adapter.failure_message, e))
        }
    }
}

/// Plain-text failure body, e.g. `安康政府页面请求失败，状态码：404`.
pub fn failure_message(site: &Site, err: &FeedError) -> String {
    match err.status() {
        Some(status) => format!("{}，状态码：{}", site.adapter.failure_message, status),
        None => format!("{}：{}", site.adapter.failure_message, err),
    }
}

/// Fetch, extract and assemble the feed for `target_url`.
///
/// # Arguments
///
/// * `fetcher` - Shared HTTP client
/// * `site` - Descriptor with the selectors and defaults to apply
/// * `target_url` - Listing page URL, as built by [`Site::target_url`]
///
/// # Returns
///
/// A document with at least one item. An empty listing yields the
/// placeholder item.
///
/// # Errors
///
/// Propagates fetch failures, body read failures and
/// [`FeedError::Cancelled`] when the parse task does not see the whole body.
pub async fn build_feed(fetcher: &Fetcher, site: &Site, target_url: &str) -> Result<FeedDocument> {
    let response = fetcher.fetch(site, target_url).await?;
    let page = extract_response(response, Arc::clone(&site.selectors)).await?;
    info!(
        items = page.items.len(),
        title = ?page.page_title,
        "Extracted listing"
    );
    Ok(assemble(site, target_url, page, &Normalizer::new(&site.adapter)))
}

/// Build the document from an extracted page.
///
/// An empty listing yields a single placeholder item linking to `target_url`.
pub fn assemble(site: &Site, target_url: &str, page: PageExtract, normalizer: &Normalizer<'_>) -> FeedDocument {
    let defaults = &site.adapter.channel;
    let title = page.page_title.unwrap_or_else(|| defaults.title.clone());
    let description = page
        .page_description
        .unwrap_or_else(|| defaults.description.clone());

    let mut items: Vec<_> = page.items.into_iter().map(|raw| normalizer.normalize(raw)).collect();
    if items.is_empty() {
        debug!(url = %target_url, "Listing is empty; adding placeholder item");
        items.push(normalizer.placeholder(target_url));
    }

    FeedDocument {
        channel: ChannelMeta {
            description: format!("{title} - {description}"),
            title,
            link: target_url.to_string(),
            language: defaults.language.clone(),
            category: defaults.category.clone(),
        },
        items,
    }
}

enum BodyEvent {
    Chunk(Vec<u8>),
    End,
}

/// Stream the response body through the extractor on a blocking thread.
#[instrument(level = "debug", skip_all)]
async fn extract_response(response: Response, selectors: Arc<CompiledSelectors>) -> Result<PageExtract> {
    let (tx, rx) = mpsc::channel(BODY_CHANNEL_DEPTH);
    let parser = tokio::task::spawn_blocking(move || parse_body(rx, selectors));

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.inspect_err(|e| warn!(error = %e, "Upstream body read failed"))?;
        if tx.send(BodyEvent::Chunk(chunk.to_vec())).await.is_err() {
            break;
        }
    }
    // The parser only exits early on a closed channel, so this send succeeds.
    let _ = tx.send(BodyEvent::End).await;
    drop(tx);

    match parser.await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Parse task failed");
            Err(FeedError::Cancelled)
        }
    }
}

fn parse_body(mut rx: mpsc::Receiver<BodyEvent>, selectors: Arc<CompiledSelectors>) -> Result<PageExtract> {
    let mut extractor = StreamingExtractor::new(selectors);
    loop {
        match rx.blocking_recv() {
            Some(BodyEvent::Chunk(bytes)) => extractor.feed(&bytes),
            Some(BodyEvent::End) => return Ok(extractor.finish().into_extract()),
            None => {
                debug!("Body stream dropped before completion; abandoning parse");
                return Err(FeedError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawItemRecord;
    use crate::sites::ankang;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    const LISTING: &str = r#"<html><head>
<title>安康市政府专栏</title>
<meta name="description" content="政务公开">
</head><body><ul>
<li class="list-li">
  <a href="/Info-123.html"><span class="list-title">通知</span></a>
  <span class="list-time">2025-03-20</span>
  <div class="list-desc">详情</div>
</li>
</ul></body></html>"#;

    const EMPTY_LISTING: &str = "<html><head><title>栏目</title></head><body><ul></ul></body></html>";

    /// A stand-in portal on a random local port; returns its origin.
    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route("/Node-1.html", get(|| async { LISTING }))
            .route("/Node-2.html", get(|| async { EMPTY_LISTING }))
            .route(
                "/Node-503.html",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn local_site() -> Site {
        Site::new(ankang::adapter_at(&spawn_upstream().await)).unwrap()
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_upstream_404_is_500_with_status() {
        let site = local_site().await;
        let response = handle(&fetcher(), &site, "404").await;
        assert_eq!(response.status, 500);
        assert_eq!(response.content_type, "text/plain; charset=utf-8");
        assert!(response.body.contains("404"), "{}", response.body);
        assert!(response.body.starts_with("安康政府页面请求失败"));
    }

    #[tokio::test]
    async fn test_upstream_503_is_500_with_status() {
        let site = local_site().await;
        let response = handle(&fetcher(), &site, "503").await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body, "安康政府页面请求失败，状态码：503");
    }

    #[tokio::test]
    async fn test_listing_renders_one_item() {
        let site = local_site().await;
        let origin = site.origin().to_string();
        let response = handle(&fetcher(), &site, "1").await;

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/xml; charset=utf-8");
        let xml = &response.body;
        assert_eq!(xml.matches("<item>").count(), 1);
        assert!(xml.contains(&format!("<link>{origin}/Info-123.html</link>")));
        assert!(xml.contains("<title><![CDATA[通知]]></title>"));
        assert!(xml.contains("<pubDate>Thu, 20 Mar 2025 00:00:00 GMT</pubDate>"));
        assert!(xml.contains("<description><![CDATA[详情]]></description>"));
        assert!(xml.contains("<title><![CDATA[安康市政府专栏]]></title>"));
        assert!(xml.contains("<description><![CDATA[安康市政府专栏 - 政务公开]]></description>"));
        assert!(xml.contains(&format!("<link>{origin}/Node-1.html</link>")));
    }

    #[tokio::test]
    async fn test_empty_listing_gets_placeholder() {
        let site = local_site().await;
        let target = site.target_url("2");
        let response = handle(&fetcher(), &site, "2").await;

        assert_eq!(response.status, 200);
        let xml = &response.body;
        assert_eq!(xml.matches("<item>").count(), 1);
        assert!(xml.contains("<title><![CDATA[暂无政务信息]]></title>"));
        assert!(xml.contains(&format!("<link>{target}</link>")));
        assert!(xml.contains(&format!("<guid>{target}</guid>")));
        // Channel description falls back to the site default.
        assert!(xml.contains("<description><![CDATA[栏目 - 安康市政府官网政务信息订阅源]]></description>"));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_500() {
        // Bind and immediately drop a listener to get a port nobody serves.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let site = Site::new(ankang::adapter_at(&format!("http://{addr}"))).unwrap();
        let response = handle(&fetcher(), &site, "1").await;
        assert_eq!(response.status, 500);
        assert!(response.body.starts_with("安康政府页面请求失败："));
    }

    #[test]
    fn test_assemble_uses_defaults_and_keeps_order() {
        let site = Site::new(ankang::adapter()).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let normalizer = Normalizer::at(&site.adapter, now);
        let page = PageExtract {
            page_title: None,
            page_description: None,
            items: vec![
                RawItemRecord {
                    href_raw: Some("/b.html".to_string()),
                    ..RawItemRecord::default()
                },
                RawItemRecord {
                    href_raw: Some("/a.html".to_string()),
                    ..RawItemRecord::default()
                },
            ],
        };
        let target = site.target_url("9");
        let doc = assemble(&site, &target, page, &normalizer);

        assert_eq!(doc.channel.title, "安康市政府专栏");
        assert_eq!(doc.channel.description, "安康市政府专栏 - 安康市政府官网政务信息订阅源");
        assert_eq!(doc.channel.link, target);
        assert_eq!(doc.channel.language, "zh-cn");
        assert_eq!(doc.channel.category, "ankang-gov");
        let links: Vec<_> = doc.items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://www.ankang.gov.cn/b.html", "https://www.ankang.gov.cn/a.html"]
        );
    }

    #[test]
    fn test_assemble_empty_page_has_exactly_one_item() {
        let site = Site::new(ankang::adapter()).unwrap();
        let normalizer = Normalizer::new(&site.adapter);
        let target = site.target_url("3");
        let doc = assemble(&site, &target, PageExtract::default(), &normalizer);
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].link, target);
    }

    #[tokio::test]
    async fn test_dropped_body_cancels_parse() {
        let (tx, rx) = mpsc::channel(1);
        let selectors = Arc::clone(&Site::new(ankang::adapter()).unwrap().selectors);
        let parser = tokio::task::spawn_blocking(move || parse_body(rx, selectors));
        tx.send(BodyEvent::Chunk(b"<ul><li class=\"list-li\">".to_vec())).await.unwrap();
        drop(tx);
        assert!(matches!(parser.await.unwrap(), Err(FeedError::Cancelled)));
    }
}
