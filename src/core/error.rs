//! Error types for mediafetch library
//!
//! Boundary errors only: a rejected locator, bad configuration, or I/O while
//! preparing the destination. Failures reported by the fetch engine are not
//! errors here; they travel as classified `AttemptOutcome` values.

use std::fmt;

use strsim::{jaro_winkler, normalized_levenshtein};

/// Browsers the fetch engine can read cookies from
pub const SUPPORTED_BROWSERS: &[&str] = &[
    "brave", "chrome", "chromium", "edge", "firefox", "opera", "safari", "vivaldi", "whale",
];

/// Suggest the closest supported browser name for a misspelled one
pub fn suggest_browser(name: &str) -> Option<String> {
    let name = name.trim().to_lowercase();
    if name.is_empty() || SUPPORTED_BROWSERS.contains(&name.as_str()) {
        return None;
    }

    let mut best: Option<(&str, f64)> = None;
    for candidate in SUPPORTED_BROWSERS {
        // Blend both metrics: Jaro-Winkler favours shared prefixes ("chrom"),
        // Levenshtein catches transpositions ("fierfox")
        let score = (jaro_winkler(&name, candidate) + normalized_levenshtein(&name, candidate)) / 2.0;
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((candidate, score)),
        }
    }

    best.filter(|(_, score)| *score >= 0.6)
        .map(|(candidate, _)| candidate.to_string())
}

/// Main error type for mediafetch operations
#[derive(Debug)]
pub enum Error {
    /// Locator is empty or not a URL
    InvalidInput(String),

    /// Locator is a URL whose host is not allow-listed
    UnsupportedHost(String),

    /// Configured browser is not one the engine can read cookies from
    UnknownBrowser {
        name: String,
        suggestion: Option<String>,
    },

    /// Invalid configuration value
    Config(String),

    /// File I/O error
    IoError(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => {
                write!(f, "Invalid input: {}", msg)
            }
            Error::UnsupportedHost(host) => {
                write!(f, "Host '{}' is not in the list of supported video hosts", host)
            }
            Error::UnknownBrowser { name, suggestion } => match suggestion {
                Some(suggestion) => write!(
                    f,
                    "Browser '{}' is not supported. Did you mean '{}'?",
                    name, suggestion
                ),
                None => write!(
                    f,
                    "Browser '{}' is not supported (expected one of: {})",
                    name,
                    SUPPORTED_BROWSERS.join(", ")
                ),
            },
            Error::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            Error::IoError(err) => {
                write!(f, "I/O error: {}", err)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

/// Convenience result type for mediafetch operations
pub type Result<T> = std::result::Result<T, Error>;
