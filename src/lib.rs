//! # Mediafetch Library
//!
//! Downloads a single video through an external fetch engine (`yt-dlp`) and
//! escalates to a signed-in session only when the site asks for one.
//!
//! ## Features
//!
//! - **Anonymous first**: credentials are never sent unless an anonymous attempt is refused
//! - **Cookie sources**: an exported `cookies.txt` or a local browser profile
//! - **One fallback**: a locked or undecryptable browser store falls back to the cookie file
//! - **Actionable failures**: every failure is classified and paired with remediation text
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = mediafetch::FetchConfig::from_env()?;
//!     let report = mediafetch::fetch("https://www.youtube.com/watch?v=dQw4w9WgXcQ", config).await?;
//!
//!     match report.saved_location {
//!         Some(path) => println!("Saved to {}", path.display()),
//!         None => eprintln!("{}", report.guidance.unwrap_or_default()),
//!     }
//!     std::process::exit(report.exit_status.code());
//! }
//! ```
//!
//! ## Custom Engines
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use mediafetch::{async_trait, EngineFailure, FetchConfig, FetchEngine, FetchOptions, FetchRequest, Orchestrator};
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl FetchEngine for Offline {
//!     async fn fetch(&self, _: &FetchRequest, _: &FetchOptions) -> Result<PathBuf, EngineFailure> {
//!         Err(EngineFailure::new("ERROR: network is unreachable"))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = Orchestrator::new(Arc::new(Offline), FetchConfig::default())
//!     .run("https://youtu.be/dQw4w9WgXcQ")
//!     .await?;
//! assert!(!report.is_success());
//! # Ok(())
//! # }
//! ```

pub use async_trait::async_trait;

pub use crate::core::classifier::{ErrorClassifier, ErrorKind, MarkerClassifier, MarkerTable};
pub use crate::core::config::{default_destination, normalize_browser, FetchConfig, MAX_TRANSIENT_RETRIES};
pub use crate::core::credentials::{
    fallback_source, resolve_credentials, AuthConfig, CredentialPreference, CredentialSettings,
};
pub use crate::core::diagnostics::{
    analyze_cookie_file, analyze_cookie_text, CredentialDiagnostics, DiagnosticsProfile,
};
pub use crate::core::engine::{
    EngineFailure, FetchEngine, FetchOptions, FetchRequest, ProgressCallback, YtDlpEngine,
};
pub use crate::core::error::{suggest_browser, Error, Result, SUPPORTED_BROWSERS};
pub use crate::core::executor::{AttemptExecutor, AttemptOutcome};
pub use crate::core::guidance::{auth_setup_help, remediation};
pub use crate::core::orchestrator::{
    ExitStatus, FetchPlan, FetchReport, OrchestrationState, Orchestrator, StateCallback,
};
pub use crate::core::source::{validate_locator, HostAllowList, HostPattern, DEFAULT_ALLOWED_HOSTS};

// Internal modules
mod core;

/// Fetch one locator with the `yt-dlp` engine named in `config`
///
/// Returns `Err` only when the locator is rejected before any attempt.
pub async fn fetch(locator: &str, config: FetchConfig) -> Result<FetchReport> {
    Orchestrator::with_ytdlp(config).run(locator).await
}

/// Fetch with a progress callback receiving (done, total) permille
pub async fn fetch_with_progress<F>(locator: &str, mut config: FetchConfig, progress: F) -> Result<FetchReport>
where
    F: Fn(u64, u64) + Send + Sync + 'static,
{
    config.fetch.progress = Some(std::sync::Arc::new(progress));
    fetch(locator, config).await
}

/// Describe what `fetch` would do without invoking the engine
pub fn plan(locator: &str, config: FetchConfig) -> Result<FetchPlan> {
    Orchestrator::with_ytdlp(config).plan(locator)
}
