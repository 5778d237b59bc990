//! Relay error taxonomy.

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by a relay operation.
///
/// Everything except [`RelayError::RelayInterrupted`] happens before the
/// response head is committed and maps to a clean status code.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The target parameter is absent or empty.
    #[error("missing target parameter '{0}'")]
    MissingTarget(String),

    /// The target is not an absolute http(s) URL.
    #[error("invalid target URL '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    /// Target policy refused the URL.
    #[error("target '{0}' is not allowed")]
    ForbiddenTarget(String),

    /// A form body could not be read while looking for the target.
    #[error("unreadable request body: {0}")]
    InvalidRequestBody(String),

    /// Method outside the relayable set.
    #[error("unsupported method '{0}'")]
    UnsupportedMethod(String),

    /// Method known but disabled by policy.
    #[error("method '{0}' is not allowed")]
    ForbiddenMethod(String),

    /// DNS, connect or TLS failure talking to the target.
    #[error("upstream connection failed: {0}")]
    ConnectError(String),

    /// No response head from the target within the budget.
    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    /// Content-type policy refused the upstream response.
    #[error("content type '{0}' is not allowed")]
    ForbiddenContentType(String),

    /// Failure after the head was committed; the stream is cut short.
    #[error("relay interrupted after {bytes} bytes: {reason}")]
    RelayInterrupted { bytes: u64, reason: String },
}

impl RelayError {
    /// Status returned to the caller, `None` once headers are on the wire.
    pub fn status_code(&self) -> Option<StatusCode> {
        let status = match self {
            RelayError::MissingTarget(_)
            | RelayError::InvalidTarget { .. }
            | RelayError::InvalidRequestBody(_)
            | RelayError::UnsupportedMethod(_) => StatusCode::BAD_REQUEST,
            RelayError::ForbiddenTarget(_) | RelayError::ForbiddenContentType(_) => StatusCode::FORBIDDEN,
            RelayError::ForbiddenMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::ConnectError(_) => StatusCode::BAD_GATEWAY,
            RelayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::RelayInterrupted { .. } => return None,
        };
        Some(status)
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MissingTarget(_) => "missing_target",
            RelayError::InvalidTarget { .. } => "invalid_target",
            RelayError::ForbiddenTarget(_) => "forbidden_target",
            RelayError::InvalidRequestBody(_) => "invalid_request_body",
            RelayError::UnsupportedMethod(_) => "unsupported_method",
            RelayError::ForbiddenMethod(_) => "forbidden_method",
            RelayError::ConnectError(_) => "connect_error",
            RelayError::UpstreamTimeout(_) => "upstream_timeout",
            RelayError::ForbiddenContentType(_) => "forbidden_content_type",
            RelayError::RelayInterrupted { .. } => "relay_interrupted",
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RelayError::MissingTarget("url".into()).status_code(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(RelayError::ForbiddenTarget("x".into()).status_code(), Some(StatusCode::FORBIDDEN));
        assert_eq!(RelayError::UnsupportedMethod("TRACE".into()).status_code(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(RelayError::ConnectError("refused".into()).status_code(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(
            RelayError::UpstreamTimeout(Duration::from_secs(1)).status_code(),
            Some(StatusCode::GATEWAY_TIMEOUT)
        );
        let interrupted = RelayError::RelayInterrupted { bytes: 10, reason: "reset".into() };
        assert_eq!(interrupted.status_code(), None);
        assert_eq!(interrupted.kind(), "relay_interrupted");
    }
}
