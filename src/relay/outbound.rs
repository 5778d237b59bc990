//! Outbound request construction.
//!
//! # Responsibilities
//! - Map the inbound method onto the relayable set
//! - Copy end-to-end headers, never the hop-by-hop set
//! - Attach the inbound body as a stream for POST/PUT/PATCH
//! - Forward query parameters other than the target parameter
//!
//! # Design Decisions
//! - No I/O happens here; the body is moved, never read
//! - Extra query pairs are appended raw so their encoding survives

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use url::{form_urlencoded, Url};

use crate::relay::error::{RelayError, RelayResult};
use crate::relay::headers;
use crate::relay::message::{OutboundRequest, ProxyRequest};
use crate::relay::method::RelayMethod;
use crate::relay::policy::MethodPolicy;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

pub struct OutboundRequestBuilder {
    target_param: String,
    methods: MethodPolicy,
    forwarded_headers: bool,
}

impl OutboundRequestBuilder {
    pub fn new(target_param: impl Into<String>, methods: MethodPolicy) -> Self {
        Self {
            target_param: target_param.into(),
            methods,
            forwarded_headers: false,
        }
    }

    pub fn with_forwarded_headers(mut self, enabled: bool) -> Self {
        self.forwarded_headers = enabled;
        self
    }

    /// `base_url` is the relay's own URL for this request; its scheme is
    /// what the caller used and becomes `X-Forwarded-Proto`.
    pub fn build(&self, inbound: ProxyRequest, mut target: Url, base_url: &Url) -> RelayResult<OutboundRequest> {
        let method = RelayMethod::parse(inbound.method.as_str())
            .ok_or_else(|| RelayError::UnsupportedMethod(inbound.method.to_string()))?;
        if !self.methods.permits(method) {
            return Err(RelayError::ForbiddenMethod(method.to_string()));
        }

        let mut outbound_headers = headers::end_to_end(&inbound.headers);
        if self.forwarded_headers {
            append_forwarded(&mut outbound_headers, &inbound, base_url.scheme());
        }

        forward_query(&mut target, inbound.query(), &self.target_param);

        let (body, content_length) = match inbound.body {
            Some(body) if method.carries_body() => {
                let declared = inbound
                    .headers
                    .get(header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                (Some(body), declared)
            }
            _ => (None, None),
        };

        Ok(OutboundRequest {
            method,
            url: target,
            headers: outbound_headers,
            body,
            content_length,
        })
    }
}

fn names_param(pair: &str, param: &str) -> bool {
    let key = pair.split('=').next().unwrap_or_default();
    form_urlencoded::parse(key.as_bytes())
        .next()
        .map(|(k, _)| k == param)
        .unwrap_or(false)
}

/// Append every inbound query pair except the target parameter.
fn forward_query(target: &mut Url, query: Option<&str>, param: &str) {
    let Some(query) = query else {
        return;
    };
    let extra: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && !names_param(pair, param))
        .collect();
    if extra.is_empty() {
        return;
    }
    let extra = extra.join("&");
    let joined = match target.query() {
        Some(existing) if !existing.is_empty() => format!("{}&{}", existing, extra),
        _ => extra,
    };
    target.set_query(Some(&joined));
}

fn append_forwarded(headers: &mut HeaderMap, inbound: &ProxyRequest, scheme: &str) {
    if let Some(peer) = inbound.peer {
        let chain = match inbound.headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{}, {}", prior, peer.ip()),
            None => peer.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
    if !headers.contains_key(&X_FORWARDED_HOST) {
        if let Some(host) = inbound.headers.get(header::HOST) {
            headers.insert(X_FORWARDED_HOST, host.clone());
        }
    }
    if !headers.contains_key(&X_FORWARDED_PROTO) {
        if let Ok(value) = HeaderValue::from_str(scheme) {
            headers.insert(X_FORWARDED_PROTO, value);
        }
    }
}
