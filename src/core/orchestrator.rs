//! Download orchestration for mediafetch
//!
//! Drives one locator through the authentication state machine:
//!
//! ```text
//! Unauthenticated --AuthRequired--> ResolvingCredentials --source--> AuthenticatedAttempt
//!                                          |                            |
//!                                          +--none--> Failed            +--locked/decrypt (browser)--> FallbackAttempt
//! ```
//!
//! Every attempt is awaited to completion before the next decision. A run makes
//! at most three engine attempts (anonymous, authenticated, one fallback), plus
//! any transient retries explicitly enabled in the configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use crate::core::classifier::{ErrorClassifier, ErrorKind, MarkerClassifier};
use crate::core::config::FetchConfig;
use crate::core::credentials::{fallback_source, resolve_credentials, AuthConfig};
use crate::core::diagnostics::{analyze_cookie_file, CredentialDiagnostics, DiagnosticsProfile};
use crate::core::engine::{FetchEngine, FetchRequest, YtDlpEngine};
use crate::core::error::Result;
use crate::core::executor::{AttemptExecutor, AttemptOutcome};
use crate::core::guidance;
use crate::core::source::validate_locator;

/// Observer invoked whenever the orchestrator enters a state
pub type StateCallback = Arc<dyn Fn(&OrchestrationState) + Send + Sync>;

/// States of one fetch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestrationState {
    Unauthenticated,
    ResolvingCredentials,
    AuthenticatedAttempt { source: AuthConfig },
    FallbackAttempt { source: AuthConfig },
    Succeeded,
    Failed { kind: ErrorKind },
}

impl OrchestrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationState::Succeeded | OrchestrationState::Failed { .. }
        )
    }
}

/// Process exit status categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    /// Locator or configuration rejected before any attempt
    InvalidInput,
    /// Anonymous attempt failed for a reason credentials cannot fix
    FetchFailed,
    /// Authentication needed but no credential source configured
    NoCredentials,
    /// An attempt carrying credentials failed
    AuthenticatedAttemptFailed,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::InvalidInput | ExitStatus::FetchFailed => 1,
            ExitStatus::NoCredentials => 2,
            ExitStatus::AuthenticatedAttemptFailed => 3,
        }
    }
}

/// Everything a caller needs to report on a finished run
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub locator: String,
    pub state: OrchestrationState,
    pub transitions: Vec<OrchestrationState>,
    /// Engine invocations, transient retries included
    pub attempts: u32,
    /// Source carried by the last attempt
    pub credential_source: Option<AuthConfig>,
    pub saved_location: Option<PathBuf>,
    pub error_kind: Option<ErrorKind>,
    pub raw_message: Option<String>,
    pub guidance: Option<String>,
    pub diagnostics: Option<CredentialDiagnostics>,
    pub warnings: Vec<String>,
    pub exit_status: ExitStatus,
}

impl FetchReport {
    fn new(locator: &str) -> Self {
        Self {
            locator: locator.to_string(),
            state: OrchestrationState::Unauthenticated,
            transitions: Vec::new(),
            attempts: 0,
            credential_source: None,
            saved_location: None,
            error_kind: None,
            raw_message: None,
            guidance: None,
            diagnostics: None,
            warnings: Vec::new(),
            exit_status: ExitStatus::Success,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == OrchestrationState::Succeeded
    }

    fn fail(&mut self, kind: ErrorKind, raw_message: Option<String>, exit_status: ExitStatus) -> OrchestrationState {
        self.error_kind = Some(kind);
        self.raw_message = raw_message;
        self.exit_status = exit_status;
        self.guidance = Some(match exit_status {
            ExitStatus::NoCredentials => guidance::auth_setup_help(),
            _ => guidance::remediation(kind),
        });
        OrchestrationState::Failed { kind }
    }

    fn succeed(&mut self, saved_location: PathBuf) -> OrchestrationState {
        self.saved_location = Some(saved_location);
        self.exit_status = ExitStatus::Success;
        OrchestrationState::Succeeded
    }
}

/// What a run would do, without touching the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchPlan {
    pub locator: String,
    pub destination: PathBuf,
    /// Source used if the anonymous attempt asks for sign-in
    pub escalation_source: Option<AuthConfig>,
    /// Source used if the escalation source cannot be read
    pub fallback_source: Option<AuthConfig>,
}

/// Coordinates attempts, classification and credential escalation
pub struct Orchestrator {
    engine: Arc<dyn FetchEngine>,
    classifier: Arc<dyn ErrorClassifier>,
    config: FetchConfig,
    on_state: Option<StateCallback>,
}

impl Orchestrator {
    /// Create an orchestrator; transient markers are only installed when retries are enabled
    pub fn new(engine: Arc<dyn FetchEngine>, config: FetchConfig) -> Self {
        let classifier: Arc<dyn ErrorClassifier> = if config.transient_retries > 0 {
            Arc::new(MarkerClassifier::with_transient())
        } else {
            Arc::new(MarkerClassifier::default())
        };
        Self {
            engine,
            classifier,
            config,
            on_state: None,
        }
    }

    /// Create an orchestrator driving the `yt-dlp` binary named in the config
    pub fn with_ytdlp(config: FetchConfig) -> Self {
        let engine = Arc::new(YtDlpEngine::new(config.engine_path.clone()));
        Self::new(engine, config)
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_state_callback(mut self, callback: StateCallback) -> Self {
        self.on_state = Some(callback);
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Validates the locator and reports which sources escalation would use
    pub fn plan(&self, locator: &str) -> Result<FetchPlan> {
        let url = validate_locator(locator, &self.config.allowed_hosts)?;
        let escalation_source = resolve_credentials(&self.config.credentials);
        let fallback = escalation_source
            .as_ref()
            .and_then(|primary| fallback_source(&self.config.credentials, primary));

        Ok(FetchPlan {
            locator: url.to_string(),
            destination: self.config.fetch.destination.clone(),
            escalation_source,
            fallback_source: fallback,
        })
    }

    /// Runs the state machine for one locator
    ///
    /// Returns `Err` only when the locator is rejected, in which case the
    /// engine is never invoked. Fetch failures come back as a report.
    pub async fn run(&self, locator: &str) -> Result<FetchReport> {
        let url = validate_locator(locator, &self.config.allowed_hosts)?;
        let profile = DiagnosticsProfile::for_host(url.host_str().unwrap_or_default());
        let executor = AttemptExecutor::new(
            self.engine.as_ref(),
            self.classifier.as_ref(),
            &self.config.fetch,
        );

        let mut report = FetchReport::new(url.as_str());
        let mut state = OrchestrationState::Unauthenticated;

        loop {
            self.enter(&state, &mut report);
            if state.is_terminal() {
                break;
            }

            state = match state {
                OrchestrationState::Unauthenticated => {
                    let request = FetchRequest::anonymous(url.clone());
                    match self.attempt(&executor, &request, &mut report).await {
                        AttemptOutcome::Success { saved_location } => report.succeed(saved_location),
                        AttemptOutcome::Failure {
                            kind: ErrorKind::AuthRequired,
                            raw_message,
                        } => {
                            info!("Sign-in required, escalating to an authenticated attempt");
                            debug!("Anonymous attempt failed with: {raw_message}");
                            OrchestrationState::ResolvingCredentials
                        }
                        AttemptOutcome::Failure { kind, raw_message } => {
                            report.fail(kind, Some(raw_message), ExitStatus::FetchFailed)
                        }
                    }
                }

                OrchestrationState::ResolvingCredentials => {
                    match resolve_credentials(&self.config.credentials) {
                        None => {
                            info!("No credential source configured");
                            report.fail(ErrorKind::AuthRequired, None, ExitStatus::NoCredentials)
                        }
                        Some(source) => {
                            self.inspect_source(&source, &profile, &mut report);
                            OrchestrationState::AuthenticatedAttempt { source }
                        }
                    }
                }

                OrchestrationState::AuthenticatedAttempt { source } => {
                    info!("Retrying with {}", source.describe());
                    let request = FetchRequest::with_auth(url.clone(), source.clone());
                    report.credential_source = Some(source.clone());
                    match self.attempt(&executor, &request, &mut report).await {
                        AttemptOutcome::Success { saved_location } => report.succeed(saved_location),
                        AttemptOutcome::Failure {
                            kind:
                                kind @ (ErrorKind::CredentialStoreLocked
                                | ErrorKind::CredentialDecryptionFailed),
                            raw_message,
                        } if source.is_browser() => {
                            match fallback_source(&self.config.credentials, &source) {
                                Some(fallback) => {
                                    warn!("{kind}, falling back to {}", fallback.describe());
                                    debug!("Browser attempt failed with: {raw_message}");
                                    self.inspect_source(&fallback, &profile, &mut report);
                                    OrchestrationState::FallbackAttempt { source: fallback }
                                }
                                None => report.fail(
                                    kind,
                                    Some(raw_message),
                                    ExitStatus::AuthenticatedAttemptFailed,
                                ),
                            }
                        }
                        AttemptOutcome::Failure { kind, raw_message } => report.fail(
                            kind,
                            Some(raw_message),
                            ExitStatus::AuthenticatedAttemptFailed,
                        ),
                    }
                }

                OrchestrationState::FallbackAttempt { source } => {
                    let request = FetchRequest::with_auth(url.clone(), source.clone());
                    report.credential_source = Some(source);
                    match self.attempt(&executor, &request, &mut report).await {
                        AttemptOutcome::Success { saved_location } => report.succeed(saved_location),
                        AttemptOutcome::Failure { kind, raw_message } => report.fail(
                            kind,
                            Some(raw_message),
                            ExitStatus::AuthenticatedAttemptFailed,
                        ),
                    }
                }

                terminal @ (OrchestrationState::Succeeded | OrchestrationState::Failed { .. }) => {
                    terminal
                }
            };
        }

        Ok(report)
    }

    fn enter(&self, state: &OrchestrationState, report: &mut FetchReport) {
        debug!("State: {state:?}");
        if let Some(ref callback) = self.on_state {
            callback(state);
        }
        report.transitions.push(state.clone());
        report.state = state.clone();
    }

    /// One attempt, re-issued for `Transient` failures while retries remain
    async fn attempt(
        &self,
        executor: &AttemptExecutor<'_>,
        request: &FetchRequest,
        report: &mut FetchReport,
    ) -> AttemptOutcome {
        let mut retries = 0u32;

        loop {
            report.attempts += 1;
            let outcome = executor.execute(request).await;

            match outcome {
                AttemptOutcome::Failure {
                    kind: ErrorKind::Transient,
                    ref raw_message,
                } if retries < self.config.transient_retries => {
                    retries += 1;
                    let delay = backoff_delay(self.config.retry_base_delay, retries);
                    warn!(
                        "Transient failure (retry {retries}/{}): {raw_message}. Retrying in {}ms...",
                        self.config.transient_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// Runs cookie file diagnostics before a file-backed attempt; never blocks it
    fn inspect_source(&self, source: &AuthConfig, profile: &DiagnosticsProfile, report: &mut FetchReport) {
        if let AuthConfig::FileCredential { path } = source {
            let diagnostics = self.inspect_cookie_file(path, profile);
            if diagnostics.is_low_quality() {
                report.warnings.extend(diagnostics.warning_lines(profile));
            }
            report.diagnostics = Some(diagnostics);
        }
    }

    fn inspect_cookie_file(&self, path: &Path, profile: &DiagnosticsProfile) -> CredentialDiagnostics {
        let diagnostics = analyze_cookie_file(path, profile);
        if diagnostics.is_low_quality() {
            warn!(
                "Cookie file {} looks incomplete ({} {} entries, core markers {})",
                path.display(),
                diagnostics.domain_matched_entries,
                profile.primary_domain,
                if diagnostics.has_core_auth_markers { "present" } else { "missing" }
            );
        } else {
            debug!(
                "Cookie file {} looks complete ({} {} entries)",
                path.display(),
                diagnostics.domain_matched_entries,
                profile.primary_domain
            );
        }
        diagnostics
    }
}

/// `base * 2^(retry - 1)`, saturating instead of overflowing
fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credentials::{CredentialPreference, CredentialSettings};
    use crate::core::engine::{EngineFailure, FetchOptions};
    use crate::core::error::Error;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    type Hook = Box<dyn Fn(usize) + Send + Sync>;

    /// Engine that replays scripted results and records every request
    struct ScriptedEngine {
        script: Mutex<VecDeque<std::result::Result<PathBuf, EngineFailure>>>,
        requests: Mutex<Vec<FetchRequest>>,
        on_call: Option<Hook>,
    }

    impl ScriptedEngine {
        fn new(script: Vec<std::result::Result<&str, &str>>) -> Self {
            Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|step| step.map(PathBuf::from).map_err(EngineFailure::new))
                        .collect(),
                ),
                requests: Mutex::new(Vec::new()),
                on_call: None,
            }
        }

        fn with_hook(mut self, hook: Hook) -> Self {
            self.on_call = Some(hook);
            self
        }

        fn requests(&self) -> Vec<FetchRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FetchEngine for ScriptedEngine {
        async fn fetch(
            &self,
            request: &FetchRequest,
            _options: &FetchOptions,
        ) -> std::result::Result<PathBuf, EngineFailure> {
            let call = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request.clone());
                requests.len()
            };
            if let Some(ref hook) = self.on_call {
                hook(call);
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(EngineFailure::new("script exhausted")))
        }
    }

    const YT: &str = "https://www.youtube.com/watch?v=abc";
    const LOGIN: &str = "ERROR: [youtube] abc: Sign in to confirm you\u{2019}re not a bot";
    const LOCKED: &str = "ERROR: Could not copy Chrome cookie database. See https://github.com/yt-dlp/yt-dlp/issues/7271";
    const DPAPI: &str = "ERROR: Failed to decrypt with DPAPI. See https://github.com/yt-dlp/yt-dlp/issues/10927";

    fn config(credentials: CredentialSettings) -> FetchConfig {
        FetchConfig {
            credentials,
            ..Default::default()
        }
        .with_destination("/tmp/mediafetch-test")
    }

    fn browser(name: &str) -> AuthConfig {
        AuthConfig::BrowserCredential {
            browser_name: name.to_string(),
            profile_name: None,
        }
    }

    fn cookie_file(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), contents).unwrap();
        file
    }

    fn good_cookies() -> String {
        ["SID", "HSID", "SSID", "SAPISID", "LOGIN_INFO"]
            .iter()
            .map(|name| format!(".youtube.com\tTRUE\t/\tTRUE\t1767225600\t{name}\tv\n"))
            .collect()
    }

    fn orchestrator(engine: &Arc<ScriptedEngine>, config: FetchConfig) -> Orchestrator {
        Orchestrator::new(Arc::clone(engine) as Arc<dyn FetchEngine>, config)
    }

    #[tokio::test]
    async fn test_anonymous_success() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok("/tmp/mediafetch-test/clip.mp4")]));
        let report = orchestrator(&engine, config(CredentialSettings::default()))
            .run(YT)
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.exit_status, ExitStatus::Success);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.credential_source, None);
        assert_eq!(report.saved_location, Some(PathBuf::from("/tmp/mediafetch-test/clip.mp4")));
        assert_eq!(
            report.transitions,
            vec![OrchestrationState::Unauthenticated, OrchestrationState::Succeeded]
        );
        assert_eq!(engine.requests()[0].auth, None);
    }

    #[tokio::test]
    async fn test_login_required_without_credentials() {
        let engine = Arc::new(ScriptedEngine::new(vec![Err(
            "ERROR: [generic] 123: login required",
        )]));
        let mut config = config(CredentialSettings::default());
        config.allowed_hosts = config.allowed_hosts.allow("video.example.com");

        let report = orchestrator(&engine, config)
            .run("https://video.example.com/v/123")
            .await
            .unwrap();

        assert_eq!(report.state, OrchestrationState::Failed { kind: ErrorKind::AuthRequired });
        assert_eq!(report.exit_status, ExitStatus::NoCredentials);
        assert_eq!(report.exit_status.code(), 2);
        assert_eq!(report.attempts, 1);
        assert_eq!(
            report.transitions,
            vec![
                OrchestrationState::Unauthenticated,
                OrchestrationState::ResolvingCredentials,
                OrchestrationState::Failed { kind: ErrorKind::AuthRequired },
            ]
        );
        assert!(report.guidance.unwrap().contains("YT_COOKIES_BROWSER"));
    }

    #[tokio::test]
    async fn test_rejected_locator_makes_no_attempt() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok("/tmp/x.mp4")]));
        let orchestrator = orchestrator(&engine, config(CredentialSettings::default()));

        for locator in ["https://vimeo.com/1", "not a url", "", "http://www.youtube.com/watch?v=abc"] {
            let err = orchestrator.run(locator).await.unwrap_err();
            assert!(
                matches!(err, Error::InvalidInput(_) | Error::UnsupportedHost(_)),
                "{locator}: {err:?}"
            );
        }
        assert!(engine.requests().is_empty());
    }

    #[tokio::test]
    async fn test_non_auth_failure_is_terminal() {
        let engine = Arc::new(ScriptedEngine::new(vec![Err("ERROR: [youtube] abc: Video unavailable")]));
        let credentials = CredentialSettings {
            browser_name: Some("chrome".to_string()),
            ..Default::default()
        };
        let report = orchestrator(&engine, config(credentials)).run(YT).await.unwrap();

        assert_eq!(report.state, OrchestrationState::Failed { kind: ErrorKind::Fatal });
        assert_eq!(report.exit_status, ExitStatus::FetchFailed);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.raw_message.as_deref(), Some("ERROR: [youtube] abc: Video unavailable"));
        assert!(!report.transitions.contains(&OrchestrationState::ResolvingCredentials));
    }

    #[tokio::test]
    async fn test_file_preferred_when_both_configured() {
        let cookies = cookie_file(&good_cookies());
        let engine = Arc::new(ScriptedEngine::new(vec![Err(LOGIN), Ok("/tmp/mediafetch-test/clip.mp4")]));
        let credentials = CredentialSettings {
            file_path: Some(cookies.path().to_path_buf()),
            browser_name: Some("chrome".to_string()),
            ..Default::default()
        };
        let report = orchestrator(&engine, config(credentials)).run(YT).await.unwrap();

        let file = AuthConfig::FileCredential {
            path: cookies.path().to_path_buf(),
        };
        assert!(report.is_success());
        assert_eq!(report.credential_source, Some(file.clone()));
        assert_eq!(engine.requests()[1].auth, Some(file));
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_store_locked_falls_back_to_file_exactly_once() {
        let cookies = cookie_file(&good_cookies());
        let engine = Arc::new(ScriptedEngine::new(vec![Err(LOGIN), Err(LOCKED), Err(LOCKED), Ok("/never")]));
        let credentials = CredentialSettings {
            file_path: Some(cookies.path().to_path_buf()),
            browser_name: Some("chrome".to_string()),
            preference: CredentialPreference::BrowserFirst,
            ..Default::default()
        };
        let report = orchestrator(&engine, config(credentials)).run(YT).await.unwrap();

        let file = AuthConfig::FileCredential {
            path: cookies.path().to_path_buf(),
        };
        let requests = engine.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].auth, Some(browser("chrome")));
        assert_eq!(requests[2].auth, Some(file.clone()));
        assert_eq!(
            report.state,
            OrchestrationState::Failed { kind: ErrorKind::CredentialStoreLocked }
        );
        assert_eq!(report.exit_status.code(), 3);
        assert_eq!(
            report.transitions,
            vec![
                OrchestrationState::Unauthenticated,
                OrchestrationState::ResolvingCredentials,
                OrchestrationState::AuthenticatedAttempt { source: browser("chrome") },
                OrchestrationState::FallbackAttempt { source: file },
                OrchestrationState::Failed { kind: ErrorKind::CredentialStoreLocked },
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_success_reports_file_source() {
        let cookies = cookie_file(&good_cookies());
        let engine = Arc::new(ScriptedEngine::new(vec![
            Err(LOGIN),
            Err(DPAPI),
            Ok("/tmp/mediafetch-test/clip.mp4"),
        ]));
        let credentials = CredentialSettings {
            file_path: Some(cookies.path().to_path_buf()),
            browser_name: Some("edge".to_string()),
            preference: CredentialPreference::BrowserFirst,
            ..Default::default()
        };
        let report = orchestrator(&engine, config(credentials)).run(YT).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.attempts, 3);
        assert_eq!(
            report.credential_source,
            Some(AuthConfig::FileCredential {
                path: cookies.path().to_path_buf()
            })
        );
    }

    #[tokio::test]
    async fn test_configured_file_appearing_later_is_used_as_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        let path_for_hook = path.clone();
        let engine = Arc::new(
            ScriptedEngine::new(vec![Err(LOGIN), Err(LOCKED), Ok("/tmp/mediafetch-test/clip.mp4")])
                .with_hook(Box::new(move |call: usize| {
                    // User exports cookies while the browser attempt runs
                    if call == 2 {
                        std::fs::write(&path_for_hook, "SID=x\n").unwrap();
                    }
                })),
        );
        let credentials = CredentialSettings {
            file_path: Some(path.clone()),
            browser_name: Some("chrome".to_string()),
            ..Default::default()
        };
        let report = orchestrator(&engine, config(credentials)).run(YT).await.unwrap();

        assert!(report.is_success());
        assert_eq!(engine.requests()[1].auth, Some(browser("chrome")));
        assert_eq!(engine.requests()[2].auth, Some(AuthConfig::FileCredential { path }));
    }

    #[tokio::test]
    async fn test_decryption_failure_without_file_gives_targeted_guidance() {
        let engine = Arc::new(ScriptedEngine::new(vec![Err(LOGIN), Err(DPAPI)]));
        let credentials = CredentialSettings {
            browser_name: Some("chrome".to_string()),
            browser_profile: Some("Default".to_string()),
            ..Default::default()
        };
        let report = orchestrator(&engine, config(credentials)).run(YT).await.unwrap();

        assert_eq!(
            report.state,
            OrchestrationState::Failed { kind: ErrorKind::CredentialDecryptionFailed }
        );
        assert_eq!(report.exit_status, ExitStatus::AuthenticatedAttemptFailed);
        assert_eq!(report.attempts, 2);
        assert!(report.guidance.unwrap().contains("issues/10927"));
    }

    #[tokio::test]
    async fn test_auth_required_with_credentials_is_terminal() {
        let cookies = cookie_file(&good_cookies());
        let engine = Arc::new(ScriptedEngine::new(vec![Err(LOGIN), Err(LOGIN), Ok("/never")]));
        let credentials = CredentialSettings {
            file_path: Some(cookies.path().to_path_buf()),
            browser_name: Some("chrome".to_string()),
            preference: CredentialPreference::BrowserFirst,
            ..Default::default()
        };
        let report = orchestrator(&engine, config(credentials)).run(YT).await.unwrap();

        assert_eq!(report.state, OrchestrationState::Failed { kind: ErrorKind::AuthRequired });
        assert_eq!(report.exit_status.code(), 3);
        assert_eq!(engine.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_weak_cookie_file_warns_but_still_attempts() {
        let cookies = cookie_file(".example.org\tTRUE\t/\tFALSE\t0\ttheme\tdark\n");
        let engine = Arc::new(ScriptedEngine::new(vec![Err(LOGIN), Ok("/tmp/mediafetch-test/clip.mp4")]));
        let credentials = CredentialSettings {
            file_path: Some(cookies.path().to_path_buf()),
            ..Default::default()
        };
        let report = orchestrator(&engine, config(credentials)).run(YT).await.unwrap();

        let diagnostics = report.diagnostics.clone().unwrap();
        assert_eq!(diagnostics.domain_matched_entries, 0);
        assert!(!diagnostics.has_core_auth_markers);
        assert!(!report.warnings.is_empty());
        assert_eq!(engine.requests().len(), 2);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_transient_retry_is_opt_in_and_bounded() {
        // Disabled: a timeout is just Fatal
        let engine = Arc::new(ScriptedEngine::new(vec![Err("ERROR: Read timed out."), Ok("/tmp/x.mp4")]));
        let report = orchestrator(&engine, config(CredentialSettings::default())).run(YT).await.unwrap();
        assert_eq!(report.state, OrchestrationState::Failed { kind: ErrorKind::Fatal });
        assert_eq!(report.attempts, 1);

        // Enabled: retried, then succeeds
        let mut enabled = config(CredentialSettings::default()).with_transient_retries(2).unwrap();
        enabled.retry_base_delay = Duration::ZERO;
        let engine = Arc::new(ScriptedEngine::new(vec![
            Err("ERROR: Read timed out."),
            Err("ERROR: HTTP Error 503: Service Unavailable"),
            Ok("/tmp/x.mp4"),
        ]));
        let report = orchestrator(&engine, enabled.clone()).run(YT).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.attempts, 3);

        // Exhausted retries are terminal
        let engine = Arc::new(ScriptedEngine::new(vec![
            Err("ERROR: Read timed out."),
            Err("ERROR: Read timed out."),
            Err("ERROR: Read timed out."),
            Ok("/never"),
        ]));
        let report = orchestrator(&engine, enabled).run(YT).await.unwrap();
        assert_eq!(report.state, OrchestrationState::Failed { kind: ErrorKind::Transient });
        assert_eq!(report.exit_status, ExitStatus::FetchFailed);
        assert_eq!(report.attempts, 3);
    }

    #[tokio::test]
    async fn test_file_primary_store_errors_do_not_fall_back() {
        for (raw, kind) in [
            (LOCKED, ErrorKind::CredentialStoreLocked),
            (DPAPI, ErrorKind::CredentialDecryptionFailed),
        ] {
            let cookies = cookie_file(&good_cookies());
            let engine = Arc::new(ScriptedEngine::new(vec![Err(LOGIN), Err(raw), Ok("/never")]));
            let credentials = CredentialSettings {
                file_path: Some(cookies.path().to_path_buf()),
                browser_name: Some("chrome".to_string()),
                ..Default::default()
            };
            let report = orchestrator(&engine, config(credentials)).run(YT).await.unwrap();

            let file = AuthConfig::FileCredential {
                path: cookies.path().to_path_buf(),
            };
            assert_eq!(report.state, OrchestrationState::Failed { kind });
            assert_eq!(report.exit_status, ExitStatus::AuthenticatedAttemptFailed);
            assert_eq!(report.exit_status.code(), 3);
            assert_eq!(report.attempts, 2);
            assert_eq!(engine.requests()[1].auth, Some(file.clone()));
            assert!(!report
                .transitions
                .iter()
                .any(|state| matches!(state, OrchestrationState::FallbackAttempt { .. })));
        }
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(Duration::MAX, 2), Duration::MAX);
        assert_eq!(backoff_delay(base, 64), Duration::MAX);
    }

    #[tokio::test]
    async fn test_huge_retry_delay_does_not_panic() {
        let mut config = config(CredentialSettings::default()).with_transient_retries(1).unwrap();
        config.retry_base_delay = Duration::MAX;
        let engine = Arc::new(ScriptedEngine::new(vec![Err("ERROR: Read timed out.")]));
        let orchestrator = orchestrator(&engine, config);

        // Sleeping for Duration::MAX never finishes; only the delay computation matters here
        let run = tokio::time::timeout(Duration::from_millis(50), orchestrator.run(YT)).await;
        assert!(run.is_err());
        assert_eq!(engine.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_state_callback_sees_every_state() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let engine = Arc::new(ScriptedEngine::new(vec![Err(LOGIN)]));

        let report = orchestrator(&engine, config(CredentialSettings::default()))
            .with_state_callback(Arc::new(move |state: &OrchestrationState| {
                seen_clone.lock().unwrap().push(state.clone())
            }))
            .run(YT)
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), report.transitions);
    }

    #[tokio::test]
    async fn test_plan_does_not_touch_engine() {
        let cookies = cookie_file(&good_cookies());
        let engine = Arc::new(ScriptedEngine::new(vec![]));
        let credentials = CredentialSettings {
            file_path: Some(cookies.path().to_path_buf()),
            browser_name: Some("chrome".to_string()),
            preference: CredentialPreference::BrowserFirst,
            ..Default::default()
        };
        let orchestrator = orchestrator(&engine, config(credentials));

        let plan = orchestrator.plan(YT).unwrap();
        assert_eq!(plan.escalation_source, Some(browser("chrome")));
        assert!(matches!(plan.fallback_source, Some(AuthConfig::FileCredential { .. })));
        assert!(orchestrator.plan("https://vimeo.com/1").is_err());
        assert!(engine.requests().is_empty());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::InvalidInput.code(), 1);
        assert_eq!(ExitStatus::FetchFailed.code(), 1);
        assert_eq!(ExitStatus::NoCredentials.code(), 2);
        assert_eq!(ExitStatus::AuthenticatedAttemptFailed.code(), 3);
    }
}
