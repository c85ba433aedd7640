//! CLI-specific utilities for mediafetch
//!
//! Terminal rendering only; the fetch logic lives in the library.

pub mod progress;

pub use progress::ProgressManager;
