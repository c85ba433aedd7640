//! Failure classification
//!
//! Maps the opaque text of an engine failure to an `ErrorKind` through an
//! ordered marker table. The first matching row wins, so row order is the
//! precedence order.

use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;

/// Semantic failure kinds the orchestrator reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The remote resource wants a signed-in session
    AuthRequired,
    /// The browser's cookie store is held by another process
    CredentialStoreLocked,
    /// Platform decryption of stored cookies failed
    CredentialDecryptionFailed,
    /// Network hiccup worth a bounded blind retry
    Transient,
    /// Anything else
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::AuthRequired => "authentication required",
            ErrorKind::CredentialStoreLocked => "browser cookie store locked",
            ErrorKind::CredentialDecryptionFailed => "browser cookie decryption failed",
            ErrorKind::Transient => "transient network error",
            ErrorKind::Fatal => "download failed",
        };
        f.write_str(label)
    }
}

/// Strategy for turning a raw failure message into an `ErrorKind`
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, raw_message: &str) -> ErrorKind;
}

const STORE_LOCKED_MARKERS: &[&str] = &[
    "could not copy chrome cookie database",
    "cookie database is locked",
    "database is locked",
];

const DECRYPTION_MARKERS: &[&str] = &[
    "failed to decrypt with dpapi",
    "failed to decrypt",
    "cannot decrypt v10 cookies",
];

const AUTH_REQUIRED_MARKERS: &[&str] = &[
    "sign in to confirm you're not a bot",
    "sign in to confirm your age",
    "only available for registered users",
    "login required",
    "use --cookies-from-browser or --cookies",
];

const TRANSIENT_MARKERS: &[&str] = &[
    "timed out",
    "connection reset",
    "temporary failure in name resolution",
    "remote end closed connection",
    "http error 500",
    "http error 502",
    "http error 503",
    "http error 504",
];

static DEFAULT_TABLE: Lazy<MarkerTable> = Lazy::new(|| {
    MarkerTable::empty()
        .with_rows(STORE_LOCKED_MARKERS, ErrorKind::CredentialStoreLocked)
        .with_rows(DECRYPTION_MARKERS, ErrorKind::CredentialDecryptionFailed)
        .with_rows(AUTH_REQUIRED_MARKERS, ErrorKind::AuthRequired)
});

/// Ordered `(marker, kind)` rows; unmatched messages are `Fatal`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerTable {
    rows: Vec<(String, ErrorKind)>,
}

impl Default for MarkerTable {
    fn default() -> Self {
        DEFAULT_TABLE.clone()
    }
}

impl MarkerTable {
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    /// Appends a row; it ranks below every existing row
    pub fn with_marker(mut self, marker: &str, kind: ErrorKind) -> Self {
        let marker = normalize(marker.trim());
        if !marker.is_empty() {
            self.rows.push((marker, kind));
        }
        self
    }

    pub fn with_rows(self, markers: &[&str], kind: ErrorKind) -> Self {
        markers
            .iter()
            .fold(self, |table, marker| table.with_marker(marker, kind))
    }

    /// Appends the network markers that map to `Transient`
    pub fn with_transient_markers(self) -> Self {
        self.with_rows(TRANSIENT_MARKERS, ErrorKind::Transient)
    }

    pub fn lookup(&self, raw_message: &str) -> ErrorKind {
        let message = normalize(raw_message);
        self.rows
            .iter()
            .find(|(marker, _)| message.contains(marker.as_str()))
            .map(|(_, kind)| *kind)
            .unwrap_or(ErrorKind::Fatal)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Case-folds and straightens typographic apostrophes
fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

/// Default classifier backed by a marker table
#[derive(Debug, Clone, Default)]
pub struct MarkerClassifier {
    table: MarkerTable,
}

impl MarkerClassifier {
    pub fn new(table: MarkerTable) -> Self {
        Self { table }
    }

    /// Default table plus transient network markers
    pub fn with_transient() -> Self {
        Self::new(MarkerTable::default().with_transient_markers())
    }
}

impl ErrorClassifier for MarkerClassifier {
    fn classify(&self, raw_message: &str) -> ErrorKind {
        self.table.lookup(raw_message)
    }
}
