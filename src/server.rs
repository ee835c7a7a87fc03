//! HTTP surface: one `GET {route}/{node_id}` per configured site.

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::fetch::Fetcher;
use crate::pipeline::{self, FeedResponse};
use crate::sites::Site;
use crate::utils::truncate_for_log;

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Fetcher,
}

pub fn create_router(state: AppState, sites: &[Arc<Site>]) -> Router {
    sites
        .iter()
        .fold(Router::new(), |router, site| register(router, Arc::clone(site)))
        .with_state(state)
}

/// Mount the feed route of `site` on `router`.
pub fn register(router: Router<AppState>, site: Arc<Site>) -> Router<AppState> {
    let pattern = site.route_pattern();
    info!(site = %site.adapter.name, route = %pattern, "Registering feed route");
    router.route(
        &pattern,
        get(move |State(state): State<AppState>, Path(node_id): Path<String>| {
            let site = Arc::clone(&site);
            async move { serve_feed(&state, &site, &node_id).await }
        }),
    )
}

#[instrument(level = "debug", skip(state, site), fields(site = %site.adapter.name))]
async fn serve_feed(state: &AppState, site: &Site, node_id: &str) -> Response {
    let feed = pipeline::handle(&state.fetcher, site, node_id).await;
    if feed.status != 200 {
        warn!(status = feed.status, body = %truncate_for_log(&feed.body, 200), "Responding with failure");
    }
    into_http(feed)
}

fn into_http(feed: FeedResponse) -> Response {
    let status = StatusCode::from_u16(feed.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, feed.content_type)], feed.body).into_response()
}

pub async fn run_server(addr: SocketAddr, router: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, router).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::ankang;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    const LISTING: &str = r#"<html><head><title>工作动态</title></head><body>
<div class="list-li"><a href="Info-9.html"><span class="list-title">会议</span></a>
<span class="list-time">2025-01-02 08:30</span></div>
</body></html>"#;

    async fn upstream() -> String {
        let app = Router::new().route("/Node-7.html", get(|| async { LISTING }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn router() -> Router {
        let site = Arc::new(Site::new(ankang::adapter_at(&upstream().await)).unwrap());
        let state = AppState {
            fetcher: Fetcher::new(Duration::from_secs(5)).unwrap(),
        };
        create_router(state, &[site])
    }

    async fn get_path(router: Router, path: &str) -> (StatusCode, String, String) {
        let response = router
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_feed_route_serves_rss() {
        let (status, content_type, body) = get_path(router().await, "/ankang/gov/7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/xml; charset=utf-8");
        assert!(body.contains("<rss version=\"2.0\">"));
        assert!(body.contains("<title><![CDATA[会议]]></title>"));
        // 08:30 at +8 is 00:30 UTC.
        assert!(body.contains("<pubDate>Thu, 02 Jan 2025 00:30:00 GMT</pubDate>"));
    }

    #[tokio::test]
    async fn test_missing_upstream_page_is_plain_text_500() {
        let (status, content_type, body) = get_path(router().await, "/ankang/gov/8").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(content_type, "text/plain; charset=utf-8");
        assert_eq!(body, "安康政府页面请求失败，状态码：404");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, _, _) = get_path(router().await, "/other/gov/7").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_into_http_keeps_status_and_type() {
        let response = into_http(FeedResponse {
            status: 500,
            content_type: pipeline::TEXT_CONTENT_TYPE,
            body: "x".to_string(),
        });
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    }
}
