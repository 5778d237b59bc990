//! Allow/deny policy for targets, methods and response content types.
//!
//! # Design Decisions
//! - Deny list always wins over the allow list
//! - An empty allow list means "allow everything"
//! - Host matching is case-insensitive; `*.example.com` matches subdomains
//!   but not `example.com` itself

use regex::Regex;
use url::Url;

use crate::config::PolicyConfig;
use crate::relay::method::RelayMethod;

#[derive(Debug, Clone)]
enum HostRule {
    Exact(String),
    /// Stored with the leading dot, e.g. ".example.com".
    Suffix(String),
}

impl HostRule {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_ascii_lowercase();
        match raw.strip_prefix('*') {
            Some(suffix) if suffix.starts_with('.') => HostRule::Suffix(suffix.to_string()),
            _ => HostRule::Exact(raw),
        }
    }

    fn matches(&self, host: &str) -> bool {
        match self {
            HostRule::Exact(expected) => host == expected,
            HostRule::Suffix(suffix) => host.ends_with(suffix.as_str()),
        }
    }
}

/// Decides whether a resolved target may be contacted.
#[derive(Debug, Clone, Default)]
pub struct TargetPolicy {
    allowed_hosts: Vec<HostRule>,
    denied_hosts: Vec<HostRule>,
    url_patterns: Vec<Regex>,
}

impl TargetPolicy {
    pub fn from_config(config: &PolicyConfig) -> Result<Self, regex::Error> {
        let url_patterns = config
            .allowed_url_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            allowed_hosts: config.allowed_hosts.iter().map(|h| HostRule::parse(h)).collect(),
            denied_hosts: config.denied_hosts.iter().map(|h| HostRule::parse(h)).collect(),
            url_patterns,
        })
    }

    pub fn permits(&self, target: &Url) -> bool {
        let host = match target.host_str() {
            Some(h) => h.trim_end_matches('.').to_ascii_lowercase(),
            None => return false,
        };
        if self.denied_hosts.iter().any(|r| r.matches(&host)) {
            return false;
        }
        if !self.allowed_hosts.is_empty() && !self.allowed_hosts.iter().any(|r| r.matches(&host)) {
            return false;
        }
        self.url_patterns.is_empty() || self.url_patterns.iter().any(|p| p.is_match(target.as_str()))
    }
}

/// Methods that may be relayed. Empty means all of [`RelayMethod::ALL`].
#[derive(Debug, Clone, Default)]
pub struct MethodPolicy {
    allowed: Vec<RelayMethod>,
}

impl MethodPolicy {
    /// Unknown names are skipped; validation reports them earlier.
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            allowed: config.allowed_methods.iter().filter_map(|m| RelayMethod::parse(m)).collect(),
        }
    }

    pub fn permits(&self, method: RelayMethod) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&method)
    }
}

/// Response media types relayed back to callers.
#[derive(Debug, Clone, Default)]
pub struct ContentTypePolicy {
    allowed: Vec<(String, String)>,
}

impl ContentTypePolicy {
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            allowed: config.allowed_content_types.iter().filter_map(|c| split_media_type(c)).collect(),
        }
    }

    /// Parameters such as `charset` are ignored. A missing content type is
    /// always permitted.
    pub fn permits(&self, content_type: Option<&str>) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        let Some((kind, subtype)) = content_type.and_then(split_media_type) else {
            return true;
        };
        self.allowed
            .iter()
            .any(|(k, s)| *k == kind && (s == "*" || *s == subtype))
    }
}

fn split_media_type(raw: &str) -> Option<(String, String)> {
    let essence = raw.split(';').next()?.trim().to_ascii_lowercase();
    let (kind, subtype) = essence.split_once('/')?;
    if kind.is_empty() || subtype.is_empty() {
        return None;
    }
    Some((kind.to_string(), subtype.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_empty_policy_allows_everything() {
        let policy = TargetPolicy::default();
        assert!(policy.permits(&url("http://anything.example/")));
    }

    #[test]
    fn test_host_rules() {
        let config = PolicyConfig {
            allowed_hosts: vec!["*.geo.example".into(), "Maps.Example".into()],
            denied_hosts: vec!["admin.geo.example".into()],
            ..Default::default()
        };
        let policy = TargetPolicy::from_config(&config).unwrap();

        assert!(policy.permits(&url("https://tiles.geo.example/wms")));
        assert!(policy.permits(&url("http://maps.example/")));
        assert!(!policy.permits(&url("http://geo.example/")));
        assert!(!policy.permits(&url("http://admin.geo.example/")));
        assert!(!policy.permits(&url("http://other.example/")));
    }

    #[test]
    fn test_url_patterns() {
        let config = PolicyConfig {
            allowed_url_patterns: vec![r"^https?://[^/]+/geoserver/.*$".into()],
            ..Default::default()
        };
        let policy = TargetPolicy::from_config(&config).unwrap();
        assert!(policy.permits(&url("http://a.example/geoserver/wms?SERVICE=WMS")));
        assert!(!policy.permits(&url("http://a.example/admin")));
    }

    #[test]
    fn test_method_policy() {
        let config = PolicyConfig {
            allowed_methods: vec!["get".into(), "POST".into()],
            ..Default::default()
        };
        let policy = MethodPolicy::from_config(&config);
        assert!(policy.permits(RelayMethod::Get));
        assert!(policy.permits(RelayMethod::Post));
        assert!(!policy.permits(RelayMethod::Delete));
        assert!(MethodPolicy::default().permits(RelayMethod::Delete));
    }

    #[test]
    fn test_content_type_policy() {
        let config = PolicyConfig {
            allowed_content_types: vec!["text/*".into(), "application/json".into()],
            ..Default::default()
        };
        let policy = ContentTypePolicy::from_config(&config);
        assert!(policy.permits(Some("text/xml; charset=UTF-8")));
        assert!(policy.permits(Some("Application/JSON")));
        assert!(policy.permits(None));
        assert!(!policy.permits(Some("application/octet-stream")));
    }
}
