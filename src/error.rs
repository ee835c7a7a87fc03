//! Error type shared by the fetch, extract, render and configuration stages.
//!
//! Only [`FeedError::UpstreamStatus`] and [`FeedError::Network`] are expected
//! at runtime; missing page elements and empty listings are not errors and are
//! resolved with per-field defaults instead.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    /// The portal answered with a non-2xx status.
    #[error("upstream {url} returned status {status}")]
    UpstreamStatus { status: u16, url: String },

    /// Connection, TLS, timeout or body read failure.
    #[error("upstream request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The response was abandoned before the parse pass saw the end of the body.
    #[error("parse cancelled before the body was complete")]
    Cancelled,

    #[error("xml write failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rendered feed is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// A selector string in a site descriptor could not be parsed.
    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    /// A site descriptor is inconsistent (bad origin, route, template).
    #[error("invalid site {site:?}: {reason}")]
    Config { site: String, reason: String },

    #[error("failed to parse site file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl FeedError {
    /// Upstream status code, when the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            FeedError::UpstreamStatus { status, .. } => Some(*status),
            FeedError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_message_contains_code() {
        let err = FeedError::UpstreamStatus {
            status: 404,
            url: "https://www.ankang.gov.cn/Node-1.html".to_string(),
        };
        assert!(err.to_string().contains("404"));
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_non_upstream_errors_have_no_status() {
        assert_eq!(FeedError::Cancelled.status(), None);
        let err = FeedError::Selector {
            selector: "..".to_string(),
            reason: "empty class".to_string(),
        };
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("empty class"));
    }
}
