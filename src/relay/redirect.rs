//! Redirect interception.
//!
//! # States
//! - Direct: default, the response is relayed as-is
//! - Redirected: terminal; the caller gets a self-referencing redirect and
//!   no body
//!
//! # State Transitions
//! ```text
//! Direct → Redirected: status in {301, 302, 303, 307, 308} with a usable Location
//! Direct → Direct: rewriting disabled, not a redirect, or Location missing/unusable
//! ```

use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use thiserror::Error;
use url::Url;

use crate::relay::context::RelayContext;
use crate::relay::message::{ProxyResponse, ResponseHead};

const REDIRECT_STATUSES: [StatusCode; 5] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

pub fn is_redirect(status: StatusCode) -> bool {
    REDIRECT_STATUSES.contains(&status)
}

/// Reasons a redirect falls back to a plain relay.
#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("redirect status without a Location header")]
    MissingLocation,

    #[error("unusable Location '{location}': {source}")]
    BadLocation {
        location: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug)]
pub enum RedirectState {
    Direct,
    Redirected(ResponseHead),
}

pub struct RedirectRewriter {
    param: String,
    enabled: bool,
}

impl RedirectRewriter {
    pub fn new(param: impl Into<String>, enabled: bool) -> Self {
        Self {
            param: param.into(),
            enabled,
        }
    }

    /// Build `<base>?<param>=<form-encoded location>`.
    ///
    /// An absolute `location` is embedded byte-for-byte; a relative one is
    /// first resolved against the current target.
    pub fn self_referencing_url(&self, location: &str, target: &Url, base: &Url) -> Result<Url, RedirectError> {
        let absolute = match Url::parse(location) {
            Ok(_) => location.to_string(),
            Err(url::ParseError::RelativeUrlWithoutBase) => target
                .join(location)
                .map_err(|source| RedirectError::BadLocation {
                    location: location.to_string(),
                    source,
                })?
                .to_string(),
            Err(source) => {
                return Err(RedirectError::BadLocation {
                    location: location.to_string(),
                    source,
                })
            }
        };

        let mut own = base.clone();
        own.query_pairs_mut().append_pair(&self.param, &absolute);
        Ok(own)
    }

    fn rewrite(&self, response: &ProxyResponse, ctx: &RelayContext) -> Result<ResponseHead, RedirectError> {
        let location = response
            .header_str(header::LOCATION)
            .ok_or(RedirectError::MissingLocation)?;
        let own = self.self_referencing_url(location.trim(), &ctx.target, &ctx.base_url)?;

        let mut headers = HeaderMap::new();
        // Url serialisation is always ASCII.
        if let Ok(value) = HeaderValue::from_str(own.as_str()) {
            headers.insert(header::LOCATION, value);
        }
        Ok(ResponseHead {
            status: response.status,
            headers,
            has_entity: false,
        })
    }

    /// Decide the state for this response.
    pub fn inspect(&self, response: &ProxyResponse, ctx: &RelayContext) -> RedirectState {
        if !self.enabled || !is_redirect(response.status) {
            return RedirectState::Direct;
        }
        match self.rewrite(response, ctx) {
            Ok(head) => RedirectState::Redirected(head),
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    status = %response.status,
                    error = %e,
                    "Redirect not rewritten, relaying as-is"
                );
                RedirectState::Direct
            }
        }
    }
}
