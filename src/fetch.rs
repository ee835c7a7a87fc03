//! Upstream page fetching.
//!
//! Portals tend to reject obvious bots, so every request carries the headers
//! of a desktop browser and a `Referer` pointing at the portal's home page.
//! A request is attempted once; non-2xx responses are failures.

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::error::{FeedError, Result};
use crate::sites::Site;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Default whole-request timeout, body included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared HTTP client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Per-site headers sent with every listing request.
    pub fn headers(site: &Site) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        if let Ok(referer) = HeaderValue::from_str(&format!("{}/", site.origin())) {
            headers.insert(REFERER, referer);
        }
        if let Ok(lang) = HeaderValue::from_str(&site.adapter.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, lang);
        }
        headers
    }

    /// GET `url` with the site's browser headers.
    ///
    /// # Arguments
    ///
    /// * `site` - Supplies the `Referer` origin and `Accept-Language`
    /// * `url` - The listing page to request
    ///
    /// # Returns
    ///
    /// The response with a 2xx status. Its body is not read yet, so callers
    /// can stream it.
    ///
    /// # Errors
    ///
    /// - [`FeedError::UpstreamStatus`] when the portal answers non-2xx
    /// - [`FeedError::Network`] on connection, TLS or timeout failures
    #[instrument(level = "info", skip(self, site), fields(site = %site.adapter.name))]
    pub async fn fetch(&self, site: &Site, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .headers(Self::headers(site))
            .send()
            .await
            .inspect_err(|e| warn!(error = %e, "Upstream request failed"))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Upstream returned an error status");
            return Err(FeedError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        info!(status = status.as_u16(), length = ?response.content_length(), "Upstream responded");
        Ok(response)
    }
}
