//! CLI-specific progress handling for mediafetch
//!
//! One spinner for the whole run. Its message follows the orchestration state;
//! once the engine reports a percentage it turns into a bar.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use mediafetch::{OrchestrationState, ProgressCallback, StateCallback};

const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {msg}";
const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent}% {msg}";

/// Creates the spinner shown while attempts run
pub fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Short label for a state
pub fn state_message(state: &OrchestrationState) -> String {
    match state {
        OrchestrationState::Unauthenticated => "🌐 Trying without sign-in".to_string(),
        OrchestrationState::ResolvingCredentials => "🔑 Sign-in required, looking for cookies".to_string(),
        OrchestrationState::AuthenticatedAttempt { source } => format!("🔐 Retrying with {}", source.describe()),
        OrchestrationState::FallbackAttempt { source } => format!("↪️  Falling back to {}", source.describe()),
        OrchestrationState::Succeeded => "✅ Download completed!".to_string(),
        OrchestrationState::Failed { kind } => format!("❌ {kind}"),
    }
}

/// Progress display for one fetch run
pub struct ProgressManager {
    pub pb: ProgressBar,
    showing_bar: Arc<AtomicBool>,
}

impl ProgressManager {
    /// Create a visible spinner with an initial message
    pub fn new(message: &str) -> Self {
        let pb = create_spinner();
        pb.set_message(message.to_string());
        Self {
            pb,
            showing_bar: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a manager that draws nothing (`--json`, non-interactive runs)
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
            showing_bar: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Observer that relabels the spinner and resets the bar for each attempt
    pub fn state_callback(&self) -> StateCallback {
        let pb = self.pb.clone();
        let showing_bar = Arc::clone(&self.showing_bar);
        Arc::new(move |state: &OrchestrationState| {
            if state.is_terminal() {
                pb.finish_and_clear();
                return;
            }
            if showing_bar.swap(false, Ordering::SeqCst) {
                pb.set_style(
                    ProgressStyle::with_template(SPINNER_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb.set_position(0);
            }
            pb.set_message(state_message(state));
        })
    }

    /// Engine progress callback; switches the spinner to a bar on first report
    pub fn progress_callback(&self) -> ProgressCallback {
        let pb = self.pb.clone();
        let showing_bar = Arc::clone(&self.showing_bar);
        Arc::new(move |done: u64, total: u64| {
            if !showing_bar.swap(true, Ordering::SeqCst) || pb.length() != Some(total) {
                pb.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb.set_length(total);
            }
            pb.set_position(done);
        })
    }

    pub fn finish(&self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}
