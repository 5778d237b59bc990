//! The set of HTTP methods the relay forwards.

use axum::http::Method;

/// Methods accepted on the relay endpoint and issued upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
    Options,
}

impl RelayMethod {
    pub const ALL: [RelayMethod; 7] = [
        RelayMethod::Get,
        RelayMethod::Post,
        RelayMethod::Put,
        RelayMethod::Delete,
        RelayMethod::Head,
        RelayMethod::Patch,
        RelayMethod::Options,
    ];

    /// Case-insensitive lookup.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name.trim()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMethod::Get => "GET",
            RelayMethod::Post => "POST",
            RelayMethod::Put => "PUT",
            RelayMethod::Delete => "DELETE",
            RelayMethod::Head => "HEAD",
            RelayMethod::Patch => "PATCH",
            RelayMethod::Options => "OPTIONS",
        }
    }

    /// Whether the inbound body is forwarded for this method.
    pub fn carries_body(&self) -> bool {
        matches!(self, RelayMethod::Post | RelayMethod::Put | RelayMethod::Patch)
    }

    pub fn to_http(self) -> Method {
        match self {
            RelayMethod::Get => Method::GET,
            RelayMethod::Post => Method::POST,
            RelayMethod::Put => Method::PUT,
            RelayMethod::Delete => Method::DELETE,
            RelayMethod::Head => Method::HEAD,
            RelayMethod::Patch => Method::PATCH,
            RelayMethod::Options => Method::OPTIONS,
        }
    }
}

impl std::fmt::Display for RelayMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
