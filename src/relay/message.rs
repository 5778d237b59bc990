//! Per-request message types flowing through the relay.

use axum::body::{Body, HttpBody};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, Request, StatusCode, Uri};
use bytes::Bytes;
use std::net::SocketAddr;
use url::Url;

use crate::relay::error::{RelayError, RelayResult};
use crate::relay::method::RelayMethod;

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Semantic view of the inbound request.
pub struct ProxyRequest {
    pub method: Method,
    /// Inbound URI; carries the target parameter in its query string.
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Lazy body, `None` when the caller sent no entity.
    pub body: Option<Body>,
    pub peer: Option<SocketAddr>,
}

impl ProxyRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: None,
            peer: None,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Adapt an axum request. A body that is already at end of stream is
    /// treated as absent.
    pub fn from_http(request: Request<Body>, peer: Option<SocketAddr>) -> Self {
        let (parts, body) = request.into_parts();
        let body = if body.is_end_stream() { None } else { Some(body) };
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            peer,
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn content_length(&self) -> Option<u64> {
        declared_length(&self.headers)
    }

    pub fn is_form_encoded(&self) -> bool {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .eq_ignore_ascii_case("application/x-www-form-urlencoded")
            })
            .unwrap_or(false)
    }

    /// Buffer a small form-encoded body so it can be searched for the
    /// target parameter. The same bytes are put back as the body.
    ///
    /// Returns `None` without touching the body when it is not a form, has
    /// no declared length, or is larger than `limit`.
    pub async fn buffer_form(&mut self, limit: u64) -> RelayResult<Option<Bytes>> {
        if !self.is_form_encoded() {
            return Ok(None);
        }
        match self.content_length() {
            Some(length) if length <= limit => {}
            _ => return Ok(None),
        }
        let Some(body) = self.body.take() else {
            return Ok(None);
        };
        let bytes = axum::body::to_bytes(body, limit as usize)
            .await
            .map_err(|e| RelayError::InvalidRequestBody(e.to_string()))?;
        self.body = Some(Body::from(bytes.clone()));
        Ok(Some(bytes))
    }
}

impl std::fmt::Debug for ProxyRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .field("peer", &self.peer)
            .finish()
    }
}

/// Request handed to the transport.
pub struct OutboundRequest {
    pub method: RelayMethod,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Body>,
    /// Declared inbound length; `None` means stream with unknown length.
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// Response produced by the transport.
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `None` for responses without an entity.
    pub body: Option<Body>,
}

impl ProxyResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header_str(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl std::fmt::Debug for ProxyResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Status line and headers committed to the caller.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Whether body writes may follow.
    pub has_entity: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_request(body: &'static str) -> ProxyRequest {
        ProxyRequest::new(Method::POST, Uri::from_static("/proxy"))
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"),
            )
            .with_header(header::CONTENT_LENGTH, HeaderValue::from(body.len()))
            .with_body(body)
    }

    #[tokio::test]
    async fn test_buffer_form_restores_body() {
        let mut request = form_request("url=http%3A%2F%2Fexample.com%2F&x=1");
        let bytes = request.buffer_form(1024).await.unwrap().unwrap();
        assert_eq!(&bytes[..], b"url=http%3A%2F%2Fexample.com%2F&x=1");

        let again = axum::body::to_bytes(request.body.take().unwrap(), 1024).await.unwrap();
        assert_eq!(again, bytes);
    }

    #[tokio::test]
    async fn test_buffer_form_respects_limit() {
        let mut request = form_request("url=http%3A%2F%2Fexample.com%2F");
        assert!(request.buffer_form(4).await.unwrap().is_none());
        assert!(request.body.is_some());
    }

    #[tokio::test]
    async fn test_buffer_form_ignores_other_types() {
        let mut request = ProxyRequest::new(Method::POST, Uri::from_static("/proxy"))
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/xml"))
            .with_header(header::CONTENT_LENGTH, HeaderValue::from_static("7"))
            .with_body("<a></a>");
        assert!(request.buffer_form(1024).await.unwrap().is_none());
    }

    #[test]
    fn test_from_http_drops_empty_body() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/proxy?url=http://example.com/")
            .body(Body::empty())
            .unwrap();
        let proxy_request = ProxyRequest::from_http(request, None);
        assert!(proxy_request.body.is_none());
        assert_eq!(proxy_request.query(), Some("url=http://example.com/"));
    }
}
