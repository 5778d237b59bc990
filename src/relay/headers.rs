//! Hop-by-hop header filtering.
//!
//! Applied in both directions: inbound → outbound request, and upstream
//! response → caller. Framing headers are recomputed by whichever HTTP stack
//! writes the next leg.

use axum::http::header::{self, HeaderMap, HeaderName};

/// Headers that only describe a single transport leg. Lowercase, as
/// `HeaderName::as_str` always is.
pub const HOP_BY_HOP: &[&str] = &[
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Header names nominated as hop-by-hop by `Connection: a, b`.
fn connection_tokens(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect()
}

/// Copy every end-to-end header, keeping repeated values in order.
pub fn end_to_end(source: &HeaderMap) -> HeaderMap {
    let nominated = connection_tokens(source);
    let mut out = HeaderMap::with_capacity(source.len());
    for (name, value) in source.iter() {
        if is_hop_by_hop(name) || nominated.contains(name) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_blocklist_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("content-length"), HeaderValue::from_static("12"));
        headers.insert(HeaderName::from_bytes(b"Transfer-Encoding").unwrap(), HeaderValue::from_static("chunked"));
        headers.insert(HeaderName::from_bytes(b"HOST").unwrap(), HeaderValue::from_static("relay.local"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/xml"));

        let filtered = end_to_end(&headers);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("accept").unwrap(), "text/xml");
    }

    #[test]
    fn test_connection_tokens_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close, X-Session-Hint"));
        headers.insert("x-session-hint", HeaderValue::from_static("abc"));
        headers.insert("x-kept", HeaderValue::from_static("yes"));

        let filtered = end_to_end(&headers);
        assert!(filtered.get("x-session-hint").is_none());
        assert_eq!(filtered.get("x-kept").unwrap(), "yes");
    }

    #[test]
    fn test_repeated_values_preserved() {
        let mut headers = HeaderMap::new();
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));

        let filtered = end_to_end(&headers);
        let cookies: Vec<_> = filtered.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }
}
