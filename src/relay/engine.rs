//! One relay operation, start to finish.
//!
//! # Data Flow
//! ```text
//! ProxyRequest
//!     → target.rs (resolve + policy; form body only as fallback)
//!     → outbound.rs (method, headers, body, extra query)
//!     → transport (bounded by the request timeout)
//!     → redirect.rs ── Redirected ──→ rewritten head, no body
//!         │ Direct
//!         → content-type policy
//!         → response.rs (head, then streamed body)
//! ```
//!
//! # Design Decisions
//! - Errors before the head leave the sink untouched so the caller can
//!   still get a clean status
//! - The engine owns no shared mutable state; concurrent operations only
//!   share `&self`

use axum::http::{header, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::observability::metrics;
use crate::relay::context::RelayContext;
use crate::relay::error::{RelayError, RelayResult};
use crate::relay::message::ProxyRequest;
use crate::relay::outbound::OutboundRequestBuilder;
use crate::relay::policy::{ContentTypePolicy, MethodPolicy, TargetPolicy};
use crate::relay::redirect::{RedirectRewriter, RedirectState};
use crate::relay::response::ResponseRelay;
use crate::relay::sink::ResponseSink;
use crate::relay::target::TargetResolver;
use crate::relay::transport::{HttpTransport, Transport, TransportError};

/// Failure to assemble an engine from configuration.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid URL pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid public URL: {0}")]
    PublicUrl(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// How a relay operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Relayed { status: StatusCode, bytes: u64 },
    Redirected { status: StatusCode, location: String },
}

impl RelayOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayOutcome::Relayed { status, .. } | RelayOutcome::Redirected { status, .. } => *status,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RelayOutcome::Relayed { .. } => "relayed",
            RelayOutcome::Redirected { .. } => "redirected",
        }
    }
}

pub struct RelayEngine {
    resolver: TargetResolver,
    builder: OutboundRequestBuilder,
    rewriter: RedirectRewriter,
    idle_timeout: Duration,
    content_types: ContentTypePolicy,
    transport: Arc<dyn Transport>,
    request_timeout: Duration,
    form_buffer_limit: u64,
    stream_buffer_chunks: usize,
    public_url: Option<Url>,
}

impl RelayEngine {
    /// Build an engine with the reqwest transport.
    pub fn from_config(config: &RelayConfig) -> Result<Self, EngineError> {
        let transport = HttpTransport::new(&config.transport, &config.timeouts)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build an engine around any transport, e.g. a scripted test double.
    pub fn with_transport(config: &RelayConfig, transport: Arc<dyn Transport>) -> Result<Self, EngineError> {
        let relay = &config.relay;
        let public_url = relay.public_url.as_deref().map(Url::parse).transpose()?;

        Ok(Self {
            resolver: TargetResolver::new(&relay.target_param, TargetPolicy::from_config(&config.policy)?),
            builder: OutboundRequestBuilder::new(&relay.target_param, MethodPolicy::from_config(&config.policy))
                .with_forwarded_headers(relay.forwarded_headers),
            rewriter: RedirectRewriter::new(&relay.target_param, relay.rewrite_redirects),
            idle_timeout: config.timeouts.idle(),
            content_types: ContentTypePolicy::from_config(&config.policy),
            transport,
            request_timeout: config.timeouts.request(),
            form_buffer_limit: relay.form_buffer_limit,
            stream_buffer_chunks: relay.stream_buffer_chunks.max(1),
            public_url,
        })
    }

    /// Configured external URL of the relay endpoint, if any.
    pub fn public_url(&self) -> Option<&Url> {
        self.public_url.as_ref()
    }

    pub fn stream_buffer_chunks(&self) -> usize {
        self.stream_buffer_chunks
    }

    /// Run one relay operation, writing the caller's response into `sink`.
    ///
    /// `base_url` is the relay's own URL for this request; it is only used
    /// when `public_url` is not configured.
    pub async fn handle<S>(&self, request: ProxyRequest, base_url: Url, sink: &mut S) -> RelayResult<RelayOutcome>
    where
        S: ResponseSink + ?Sized,
    {
        let started = Instant::now();
        let method = request.method.to_string();
        let request_id = request
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let result = self.run(request, base_url, &request_id, sink).await;

        let sent = bytes_sent(&result);
        if sent > 0 {
            metrics::record_relayed_bytes(sent);
        }

        match &result {
            Ok(outcome) => {
                metrics::record_request(&method, outcome.status().as_u16(), outcome.label(), started);
            }
            Err(e) => {
                let status = e.status_code().map(|s| s.as_u16()).unwrap_or(0);
                metrics::record_relay_error(e.kind());
                metrics::record_request(&method, status, "error", started);
                if sink.is_committed() {
                    tracing::warn!(request_id = %request_id, error = %e, "Relay interrupted after headers were sent");
                } else {
                    tracing::info!(request_id = %request_id, kind = e.kind(), error = %e, "Relay rejected");
                }
            }
        }
        result
    }

    async fn run<S>(&self, mut request: ProxyRequest, base_url: Url, request_id: &str, sink: &mut S) -> RelayResult<RelayOutcome>
    where
        S: ResponseSink + ?Sized,
    {
        let form = if self.resolver.query_has_target(request.query()) {
            None
        } else {
            request.buffer_form(self.form_buffer_limit).await?
        };
        let target = self.resolver.resolve(request.query(), form.as_deref())?;

        let base_url = self.public_url.clone().unwrap_or(base_url);
        let ctx = RelayContext::new(request_id, target.clone(), base_url, self.request_timeout, self.idle_timeout);

        tracing::debug!(
            request_id = %ctx.request_id,
            method = %request.method,
            target = %ctx.target,
            "Relaying request"
        );

        let outbound = self.builder.build(request, target, &ctx.base_url)?;

        let response = match tokio::time::timeout(ctx.timeout, self.transport.execute(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(TransportError::Connect(reason))) => {
                tracing::warn!(request_id = %ctx.request_id, target = %ctx.target, error = %reason, "Upstream error");
                return Err(RelayError::ConnectError(reason));
            }
            Ok(Err(TransportError::Timeout)) | Err(_) => {
                tracing::warn!(request_id = %ctx.request_id, target = %ctx.target, timeout = ?ctx.timeout, "Upstream timeout");
                return Err(RelayError::UpstreamTimeout(ctx.timeout));
            }
        };

        tracing::debug!(
            request_id = %ctx.request_id,
            status = %response.status,
            elapsed = ?ctx.started.elapsed(),
            "Upstream responded"
        );

        if let RedirectState::Redirected(head) = self.rewriter.inspect(&response, &ctx) {
            let status = head.status;
            let location = head
                .headers
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            sink.send_head(head).await.map_err(|e| RelayError::RelayInterrupted {
                bytes: 0,
                reason: e.to_string(),
            })?;
            sink.finish().await.map_err(|e| RelayError::RelayInterrupted {
                bytes: 0,
                reason: e.to_string(),
            })?;
            metrics::record_redirect_rewritten();
            tracing::info!(request_id = %ctx.request_id, status = %status, location = %location, "Redirect rewritten");
            return Ok(RelayOutcome::Redirected { status, location });
        }

        let content_type = response.header_str(header::CONTENT_TYPE);
        if !self.content_types.permits(content_type) {
            return Err(RelayError::ForbiddenContentType(content_type.unwrap_or_default().to_string()));
        }

        let status = response.status;
        let bytes = ResponseRelay::new(ctx.idle_timeout).relay(response, sink).await?;

        tracing::debug!(
            request_id = %ctx.request_id,
            status = %status,
            bytes,
            elapsed = ?ctx.started.elapsed(),
            "Relay complete"
        );
        Ok(RelayOutcome::Relayed { status, bytes })
    }
}

/// Body bytes that reached the caller, including those sent before an
/// interruption.
fn bytes_sent(result: &RelayResult<RelayOutcome>) -> u64 {
    match result {
        Ok(RelayOutcome::Relayed { bytes, .. }) => *bytes,
        Err(RelayError::RelayInterrupted { bytes, .. }) => *bytes,
        Ok(RelayOutcome::Redirected { .. }) | Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_sent_counts_interrupted_streams() {
        let interrupted: RelayResult<RelayOutcome> = Err(RelayError::RelayInterrupted {
            bytes: 8192,
            reason: "caller disconnected".into(),
        });
        assert_eq!(bytes_sent(&interrupted), 8192);

        let relayed: RelayResult<RelayOutcome> = Ok(RelayOutcome::Relayed {
            status: StatusCode::OK,
            bytes: 42,
        });
        assert_eq!(bytes_sent(&relayed), 42);
    }

    #[test]
    fn test_bytes_sent_zero_without_body() {
        let redirected: RelayResult<RelayOutcome> = Ok(RelayOutcome::Redirected {
            status: StatusCode::FOUND,
            location: "http://proxy.example/relay?url=x".into(),
        });
        assert_eq!(bytes_sent(&redirected), 0);
        assert_eq!(bytes_sent(&Err(RelayError::ConnectError("refused".into()))), 0);
    }
}
