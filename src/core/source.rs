//! Locator validation for mediafetch
//!
//! Checks that a resource locator points at an allow-listed video host before
//! anything touches the network.

use serde::Serialize;
use url::Url;

use crate::core::error::{Error, Result};

/// Hosts accepted out of the box
pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &[
    "www.youtube.com",
    "youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
];

/// A single host pattern: exact host, or `*.suffix` wildcard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HostPattern {
    Exact(String),
    Suffix(String),
}

impl HostPattern {
    /// Parse a pattern like `youtu.be` or `*.example.com`
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim().trim_end_matches('.').to_lowercase();
        if pattern.is_empty() {
            return None;
        }
        match pattern.strip_prefix("*.") {
            Some("") => None,
            Some(suffix) => Some(HostPattern::Suffix(suffix.to_string())),
            None => Some(HostPattern::Exact(pattern)),
        }
    }

    pub fn matches(&self, host: &str) -> bool {
        match self {
            HostPattern::Exact(expected) => host == expected,
            // `*.example.com` covers the bare domain too
            HostPattern::Suffix(suffix) => {
                host == suffix
                    || host
                        .strip_suffix(suffix.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        }
    }
}

/// Allow-list of video hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostAllowList {
    patterns: Vec<HostPattern>,
}

impl Default for HostAllowList {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_ALLOWED_HOSTS
                .iter()
                .filter_map(|host| HostPattern::parse(host))
                .collect(),
        }
    }
}

impl HostAllowList {
    /// An allow-list with no entries; every locator is rejected
    pub fn empty() -> Self {
        Self { patterns: Vec::new() }
    }

    /// Add a pattern; blank patterns are ignored
    pub fn allow(mut self, pattern: &str) -> Self {
        if let Some(pattern) = HostPattern::parse(pattern) {
            if !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
        self
    }

    pub fn is_allowed(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_lowercase();
        self.patterns.iter().any(|pattern| pattern.matches(&host))
    }

    pub fn patterns(&self) -> &[HostPattern] {
        &self.patterns
    }
}

/// Validates a locator against the allow-list
pub fn validate_locator(locator: &str, allowed: &HostAllowList) -> Result<Url> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(Error::InvalidInput("no URL provided".to_string()));
    }

    let url = Url::parse(locator)
        .map_err(|e| Error::InvalidInput(format!("'{locator}' is not a valid URL ({e})")))?;

    if url.scheme() != "https" {
        return Err(Error::InvalidInput(format!(
            "'{locator}' must use https (got '{}')",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidInput(format!("'{locator}' has no host")))?;

    if !allowed.is_allowed(host) {
        return Err(Error::UnsupportedHost(host.to_string()));
    }

    Ok(url)
}

/// Hosts whose cookies live under youtube.com
pub fn is_youtube_family(host: &str) -> bool {
    let host = host.to_lowercase();
    host == "youtu.be" || host == "youtube.com" || host.ends_with(".youtube.com")
}
