//! Target URL resolution.
//!
//! # Responsibilities
//! - Find the target parameter in the query string (authoritative) or, as a
//!   fallback, in an already-buffered form body
//! - Require an absolute http/https URL with a host
//! - Apply the target policy before anything touches the network

use url::{form_urlencoded, Url};

use crate::relay::error::{RelayError, RelayResult};
use crate::relay::policy::TargetPolicy;

pub struct TargetResolver {
    param: String,
    policy: TargetPolicy,
}

impl TargetResolver {
    pub fn new(param: impl Into<String>, policy: TargetPolicy) -> Self {
        Self {
            param: param.into(),
            policy,
        }
    }

    pub fn param(&self) -> &str {
        &self.param
    }

    /// Whether the query string names the target parameter at all.
    pub fn query_has_target(&self, query: Option<&str>) -> bool {
        self.lookup(query.map(str::as_bytes)).is_some()
    }

    fn lookup(&self, encoded: Option<&[u8]>) -> Option<String> {
        form_urlencoded::parse(encoded?)
            .find(|(k, _)| *k == *self.param)
            .map(|(_, v)| v.into_owned())
    }

    /// Resolve the target from the query string, falling back to `form`
    /// only when the query string lacks the parameter entirely.
    pub fn resolve(&self, query: Option<&str>, form: Option<&[u8]>) -> RelayResult<Url> {
        let raw = match self.lookup(query.map(str::as_bytes)) {
            Some(value) => value,
            None => self
                .lookup(form)
                .ok_or_else(|| RelayError::MissingTarget(self.param.clone()))?,
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RelayError::MissingTarget(self.param.clone()));
        }

        let target = Url::parse(raw).map_err(|e| RelayError::InvalidTarget {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(RelayError::InvalidTarget {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", target.scheme()),
            });
        }
        if !target.has_host() {
            return Err(RelayError::InvalidTarget {
                url: raw.to_string(),
                reason: "no host".to_string(),
            });
        }

        if !self.policy.permits(&target) {
            return Err(RelayError::ForbiddenTarget(target.to_string()));
        }

        Ok(target)
    }
}
