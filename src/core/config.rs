//! Configuration for mediafetch
//!
//! Built once at the boundary and handed to the orchestrator by value. The
//! library never reads the process environment on its own; callers pass a
//! lookup function (`std::env::var` in the binary, a map in tests).

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::credentials::{CredentialPreference, CredentialSettings};
use crate::core::engine::{FetchOptions, DEFAULT_ENGINE};
use crate::core::error::{suggest_browser, Error, Result, SUPPORTED_BROWSERS};
use crate::core::source::HostAllowList;

pub const ENV_COOKIES_FILE: &str = "YT_COOKIES_FILE";
pub const ENV_COOKIES_BROWSER: &str = "YT_COOKIES_BROWSER";
pub const ENV_COOKIES_PROFILE: &str = "YT_COOKIES_PROFILE";
pub const ENV_ALLOWED_HOSTS: &str = "MEDIAFETCH_ALLOWED_HOSTS";
pub const ENV_ENGINE: &str = "MEDIAFETCH_ENGINE";
pub const ENV_PREFER_BROWSER: &str = "MEDIAFETCH_PREFER_BROWSER";

/// Base delay for transient retry backoff
pub const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Upper bound for `transient_retries`
pub const MAX_TRANSIENT_RETRIES: u32 = 5;

/// Complete configuration for one fetch
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub credentials: CredentialSettings,
    pub allowed_hosts: HostAllowList,
    pub fetch: FetchOptions,
    /// Blind retries for `Transient` failures; 0 folds them into `Fatal`
    pub transient_retries: u32,
    pub retry_base_delay: Duration,
    pub engine_path: PathBuf,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialSettings::default(),
            allowed_hosts: HostAllowList::default(),
            fetch: FetchOptions {
                destination: default_destination(),
                ..Default::default()
            },
            transient_retries: 0,
            retry_base_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
            engine_path: PathBuf::from(DEFAULT_ENGINE),
        }
    }
}

impl FetchConfig {
    /// Reads recognized keys through `lookup`, on top of the defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(path) = value(ENV_COOKIES_FILE) {
            config.credentials.file_path = Some(expand_path(&path, &lookup)?);
        }
        if let Some(browser) = value(ENV_COOKIES_BROWSER) {
            config.credentials.browser_name = Some(normalize_browser(&browser)?);
        }
        if let Some(profile) = value(ENV_COOKIES_PROFILE) {
            config.credentials.browser_profile = Some(profile);
        }
        if let Some(flag) = value(ENV_PREFER_BROWSER) {
            if parse_bool(ENV_PREFER_BROWSER, &flag)? {
                config.credentials.preference = CredentialPreference::BrowserFirst;
            }
        }
        if let Some(hosts) = value(ENV_ALLOWED_HOSTS) {
            config.allowed_hosts = hosts
                .split(',')
                .fold(config.allowed_hosts, |allowed, host| allowed.allow(host));
        }
        if let Some(engine) = value(ENV_ENGINE) {
            config.engine_path = expand_path(&engine, &lookup)?;
        }

        Ok(config)
    }

    /// Reads recognized keys from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Sets the cookie file, expanding `~` and `$VAR`
    pub fn with_cookie_file(mut self, path: &str) -> Result<Self> {
        let path = path.trim();
        self.credentials.file_path = if path.is_empty() {
            None
        } else {
            Some(expand_path(path, |key: &str| std::env::var(key).ok())?)
        };
        Ok(self)
    }

    /// Sets the browser to read cookies from
    pub fn with_browser(mut self, browser: &str, profile: Option<&str>) -> Result<Self> {
        self.credentials.browser_name = Some(normalize_browser(browser)?);
        if let Some(profile) = profile.map(str::trim).filter(|p| !p.is_empty()) {
            self.credentials.browser_profile = Some(profile.to_string());
        }
        Ok(self)
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.fetch.destination = destination.into();
        self
    }

    /// Creates the destination directory if it is missing
    pub async fn prepare_destination(&self) -> Result<&Path> {
        tokio::fs::create_dir_all(&self.fetch.destination).await?;
        Ok(&self.fetch.destination)
    }

    pub fn with_transient_retries(mut self, retries: u32) -> Result<Self> {
        if retries > MAX_TRANSIENT_RETRIES {
            return Err(Error::Config(format!(
                "transient retries must be at most {MAX_TRANSIENT_RETRIES} (got {retries})"
            )));
        }
        self.transient_retries = retries;
        Ok(self)
    }
}

/// Desktop, then home, then the working directory
pub fn default_destination() -> PathBuf {
    dirs::desktop_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Trims, lowercases and validates a browser name
pub fn normalize_browser(browser: &str) -> Result<String> {
    let browser = browser.trim().to_lowercase();
    if SUPPORTED_BROWSERS.contains(&browser.as_str()) {
        Ok(browser)
    } else {
        Err(Error::UnknownBrowser {
            suggestion: suggest_browser(&browser),
            name: browser,
        })
    }
}

/// Expands `~` and `$VAR` / `${VAR}` references
///
/// Undefined variables stay literal; such a path simply does not exist and the
/// resolver skips it.
fn expand_path<F>(raw: &str, lookup: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let home = || dirs::home_dir().map(|home| home.to_string_lossy().into_owned());
    let context = |name: &str| -> std::result::Result<Option<String>, std::env::VarError> { Ok(lookup(name)) };

    let expanded = shellexpand::full_with_context(raw, home, context)
        .map_err(|e| Error::Config(format!("cannot expand '{raw}': {e}")))?;
    Ok(Path::new(expanded.as_ref()).to_path_buf())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{key} must be a boolean (got '{other}')"))),
    }
}
