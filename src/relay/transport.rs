//! Outbound transport seam.
//!
//! # Responsibilities
//! - Define the `Transport` capability the engine depends on
//! - Provide the reqwest-backed production implementation
//!
//! # Design Decisions
//! - Redirects are never followed here; the engine decides what to do
//! - Request and response bodies stay streams end to end
//! - No overall request timeout on the client: it would also cut long
//!   bodies. The engine bounds the wait for the head, the relay bounds
//!   gaps between chunks.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use futures_util::TryStreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::config::{TimeoutConfig, TransportConfig};
use crate::relay::message::{OutboundRequest, ProxyResponse};
use crate::relay::method::RelayMethod;

#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, connect, TLS or protocol failure before a response head.
    #[error("{0}")]
    Connect(String),

    /// The client gave up waiting.
    #[error("timed out")]
    Timeout,
}

/// Executes one outbound request and returns the response head plus a lazy
/// body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: OutboundRequest) -> Result<ProxyResponse, TransportError>;
}

/// Statuses that never carry an entity.
pub fn status_has_entity(method: RelayMethod, status: StatusCode) -> bool {
    !(method == RelayMethod::Head
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

/// Production transport backed by a pooled `reqwest::Client`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    user_agent: Option<HeaderValue>,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(timeouts.connect())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .no_proxy()
            .build()?;

        let user_agent = config
            .user_agent
            .as_deref()
            .and_then(|ua| HeaderValue::from_str(ua).ok());

        Ok(Self { client, user_agent })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<ProxyResponse, TransportError> {
        let method = request.method;
        let mut headers = request.headers;
        if let Some(ua) = &self.user_agent {
            if !headers.contains_key(header::USER_AGENT) {
                headers.insert(header::USER_AGENT, ua.clone());
            }
        }

        let mut builder = self
            .client
            .request(method.to_http(), request.url)
            .headers(headers);

        match request.body {
            Some(body) => {
                if let Some(length) = request.content_length {
                    builder = builder.header(header::CONTENT_LENGTH, length);
                }
                builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
            }
            None if method.carries_body() => {
                builder = builder.body(Vec::<u8>::new());
            }
            None => {}
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Connect(error_chain(&e))
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let has_entity = status_has_entity(method, status) && response.content_length() != Some(0);

        let body = if has_entity {
            Some(Body::from_stream(response.bytes_stream().map_err(std::io::Error::other)))
        } else {
            None
        };

        Ok(ProxyResponse { status, headers, body })
    }
}

/// reqwest hides the useful part (e.g. "connection refused") in sources.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
