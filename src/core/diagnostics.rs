//! Cookie file diagnostics
//!
//! Advisory only: the counts here feed a warning, they never stop an attempt.
//! Nothing is cached because users re-export cookie files between runs.

use std::path::Path;

use serde::Serialize;

use crate::core::source::is_youtube_family;

/// Cookie names that indicate a signed-in Google/YouTube session
pub const CORE_AUTH_MARKERS: &[&str] = &[
    "SID",
    "HSID",
    "SSID",
    "SAPISID",
    "LOGIN_INFO",
    "PREF",
    "CONSENT",
    "__Secure-1PSID",
    "__Secure-3PSID",
];

/// Fewer domain cookies than this looks like a partial export
pub const MIN_DOMAIN_ENTRIES: usize = 5;

/// What a useful cookie export for a given host looks like
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsProfile {
    pub primary_domain: String,
    pub related_domains: Vec<String>,
    pub core_markers: Vec<String>,
    pub min_domain_entries: usize,
}

impl DiagnosticsProfile {
    /// Profile for the host of the locator being fetched
    pub fn for_host(host: &str) -> Self {
        let host = host.to_lowercase();
        let (primary_domain, related_domains) = if is_youtube_family(&host) {
            ("youtube.com".to_string(), vec!["accounts.google.com".to_string()])
        } else {
            let bare = host.strip_prefix("www.").unwrap_or(&host).to_string();
            (bare, Vec::new())
        };

        Self {
            primary_domain,
            related_domains,
            core_markers: CORE_AUTH_MARKERS.iter().map(|m| m.to_string()).collect(),
            min_domain_entries: MIN_DOMAIN_ENTRIES,
        }
    }
}

/// Quality signal for a cookie file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CredentialDiagnostics {
    pub total_entries: usize,
    pub domain_matched_entries: usize,
    pub related_domain_entries: usize,
    pub has_core_auth_markers: bool,
    #[serde(skip)]
    min_domain_entries: usize,
}

impl CredentialDiagnostics {
    pub fn is_low_quality(&self) -> bool {
        self.domain_matched_entries < self.min_domain_entries || !self.has_core_auth_markers
    }

    /// Advisory text shown before an attempt with a weak cookie file
    pub fn warning_lines(&self, profile: &DiagnosticsProfile) -> Vec<String> {
        let mut lines = vec![
            "The cookie file may be incomplete for authenticated access.".to_string(),
            format!(
                "Entries: {}, {} entries: {}, related-domain entries: {}",
                self.total_entries,
                profile.primary_domain,
                self.domain_matched_entries,
                self.related_domain_entries
            ),
        ];
        if self.has_core_auth_markers {
            lines.push("Session cookie names are present.".to_string());
        } else {
            lines.push(format!(
                "No session cookie names found (expected one of {}).",
                profile.core_markers.join("/")
            ));
        }
        lines.push(format!(
            "Re-export after opening https://{} while signed in (not in a private window).",
            profile.primary_domain
        ));
        lines.push(
            "Or let the engine dump them: yt-dlp --cookies-from-browser chrome --cookies new_cookies.txt"
                .to_string(),
        );
        lines
    }
}

/// One parsed cookie record
#[derive(Debug, PartialEq, Eq)]
struct CookieRecord<'a> {
    domain: Option<&'a str>,
    name: &'a str,
}

/// Parses one line into zero or more records; unknown shapes yield nothing
fn parse_line(line: &str) -> Vec<CookieRecord<'_>> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    if line.trim().is_empty() {
        return Vec::new();
    }

    // Netscape exports mark HttpOnly cookies with a comment-like prefix
    let line = match line.strip_prefix("#HttpOnly_") {
        Some(rest) => rest,
        None if line.starts_with('#') => return Vec::new(),
        None => line,
    };

    if line.contains('\t') {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            return Vec::new();
        }
        let domain = fields[0].trim();
        let name = fields[5].trim();
        if domain.is_empty() || name.is_empty() {
            return Vec::new();
        }
        return vec![CookieRecord {
            domain: Some(domain),
            name,
        }];
    }

    line.split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, _)| name.trim())
        .filter(|name| !name.is_empty() && !name.contains(char::is_whitespace))
        .map(|name| CookieRecord { domain: None, name })
        .collect()
}

fn domain_matches(cookie_domain: &str, domain: &str) -> bool {
    let cookie_domain = cookie_domain.trim_start_matches('.').to_lowercase();
    cookie_domain == domain || cookie_domain.ends_with(&format!(".{domain}"))
}

/// Computes diagnostics from cookie file contents
pub fn analyze_cookie_text(contents: &str, profile: &DiagnosticsProfile) -> CredentialDiagnostics {
    let mut diagnostics = CredentialDiagnostics {
        min_domain_entries: profile.min_domain_entries,
        ..Default::default()
    };

    for record in contents.lines().flat_map(parse_line) {
        diagnostics.total_entries += 1;

        if let Some(domain) = record.domain {
            if domain_matches(domain, &profile.primary_domain) {
                diagnostics.domain_matched_entries += 1;
            } else if profile
                .related_domains
                .iter()
                .any(|related| domain_matches(domain, related))
            {
                diagnostics.related_domain_entries += 1;
            }
        }

        if profile.core_markers.iter().any(|marker| marker == record.name) {
            diagnostics.has_core_auth_markers = true;
        }
    }

    diagnostics
}

/// Reads and analyzes a cookie file; unreadable files give all-zero diagnostics
pub fn analyze_cookie_file(path: &Path, profile: &DiagnosticsProfile) -> CredentialDiagnostics {
    match std::fs::read(path) {
        Ok(bytes) => analyze_cookie_text(&String::from_utf8_lossy(&bytes), profile),
        Err(e) => {
            log::debug!("Could not read cookie file {}: {e}", path.display());
            CredentialDiagnostics {
                min_domain_entries: profile.min_domain_entries,
                ..Default::default()
            }
        }
    }
}
