//! Per-request relay state.

use axum::http::{header, HeaderMap, Uri};
use std::time::{Duration, Instant};
use url::Url;

/// State owned by exactly one relay operation.
#[derive(Debug, Clone)]
pub struct RelayContext {
    pub request_id: String,
    pub target: Url,
    /// URL of the relay endpoint itself, used for self-referencing redirects.
    pub base_url: Url,
    /// Budget for the upstream response head.
    pub timeout: Duration,
    /// Longest gap allowed between body chunks once the head is out.
    pub idle_timeout: Duration,
    pub started: Instant,
}

impl RelayContext {
    pub fn new(
        request_id: impl Into<String>,
        target: Url,
        base_url: Url,
        timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            target,
            base_url,
            timeout,
            idle_timeout,
            started: Instant::now(),
        }
    }
}

/// Rebuild the relay's own URL from an inbound request: scheme from
/// `X-Forwarded-Proto` (default http), authority from `Host`, then the
/// request path. The query string is dropped.
pub fn derive_base_url(headers: &HeaderMap, uri: &Uri, fallback_host: &str) -> Result<Url, url::ParseError> {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| v == "http" || v == "https")
        .unwrap_or_else(|| "http".to_string());

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| fallback_host.to_string());

    Url::parse(&format!("{}://{}{}", scheme, host, uri.path()))
}
