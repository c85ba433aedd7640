//! Credential source resolution
//!
//! Turns the configured cookie settings into the single credential source an
//! authenticated attempt should carry, and decides which source (if any) may
//! serve as the one permitted fallback.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// A concrete credential source for one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Exported cookies.txt on disk
    FileCredential { path: PathBuf },
    /// Cookies read from a local browser profile by the engine
    BrowserCredential {
        browser_name: String,
        profile_name: Option<String>,
    },
}

impl AuthConfig {
    pub fn is_browser(&self) -> bool {
        matches!(self, AuthConfig::BrowserCredential { .. })
    }

    /// Human readable label for status messages
    pub fn describe(&self) -> String {
        match self {
            AuthConfig::FileCredential { path } => {
                format!("cookie file: {}", path.display())
            }
            AuthConfig::BrowserCredential {
                browser_name,
                profile_name: Some(profile),
            } => format!("browser cookies: {browser_name} / profile: {profile}"),
            AuthConfig::BrowserCredential { browser_name, .. } => {
                format!("browser cookies: {browser_name}")
            }
        }
    }
}

/// Which source wins when both are configured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPreference {
    /// Static cookie files first, browser only when no usable file exists
    #[default]
    FileFirst,
    /// Browser first, with the cookie file held back as fallback
    BrowserFirst,
}

/// Cookie settings as configured by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CredentialSettings {
    /// Already expanded (`~`, `$VAR`) by the configuration layer
    pub file_path: Option<PathBuf>,
    /// Lowercased browser name
    pub browser_name: Option<String>,
    pub browser_profile: Option<String>,
    pub preference: CredentialPreference,
}

impl CredentialSettings {
    pub fn is_empty(&self) -> bool {
        self.configured_file().is_none() && self.configured_browser().is_none()
    }

    fn configured_file(&self) -> Option<&Path> {
        self.file_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    fn configured_browser(&self) -> Option<AuthConfig> {
        let browser = self.browser_name.as_deref().map(str::trim).filter(|b| !b.is_empty())?;
        let profile = self
            .browser_profile
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Some(AuthConfig::BrowserCredential {
            browser_name: browser.to_lowercase(),
            profile_name: profile,
        })
    }

    /// The configured file, only if it is on disk right now
    fn existing_file(&self) -> Option<AuthConfig> {
        self.configured_file()
            .filter(|path| path.is_file())
            .map(|path| AuthConfig::FileCredential {
                path: path.to_path_buf(),
            })
    }
}

/// Resolves the primary credential source for an authenticated attempt
///
/// Returns `None` when nothing usable is configured, which callers treat as
/// "explain how to set up authentication", not as an error.
pub fn resolve_credentials(settings: &CredentialSettings) -> Option<AuthConfig> {
    match settings.preference {
        CredentialPreference::FileFirst => settings
            .existing_file()
            .or_else(|| settings.configured_browser()),
        CredentialPreference::BrowserFirst => settings
            .configured_browser()
            .or_else(|| settings.existing_file()),
    }
}

/// The single fallback source allowed after `primary` failed
///
/// Only a browser primary has a fallback, and only to the cookie file from the
/// same settings. A file primary never falls back, so the two sources cannot
/// alternate.
pub fn fallback_source(settings: &CredentialSettings, primary: &AuthConfig) -> Option<AuthConfig> {
    if !primary.is_browser() {
        return None;
    }
    settings.existing_file()
}
