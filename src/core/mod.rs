//! Core library modules for mediafetch
//!
//! Everything here is independent of the command line; the binary only builds
//! a `FetchConfig` and renders the resulting `FetchReport`.

pub mod classifier;
pub mod config;
pub mod credentials;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod executor;
pub mod guidance;
pub mod orchestrator;
pub mod source;

pub use orchestrator::Orchestrator;
