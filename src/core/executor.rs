//! Fetch attempt executor
//!
//! Runs the engine exactly once per request and turns the result into an
//! `AttemptOutcome`. It never inspects failure text itself; the classifier
//! does that.

use std::path::PathBuf;

use serde::Serialize;

use crate::core::classifier::{ErrorClassifier, ErrorKind};
use crate::core::engine::{FetchEngine, FetchOptions, FetchRequest};

/// Result of a single engine invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success { saved_location: PathBuf },
    Failure { kind: ErrorKind, raw_message: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success { .. })
    }
}

/// Executes single attempts against an engine
pub struct AttemptExecutor<'a> {
    engine: &'a dyn FetchEngine,
    classifier: &'a dyn ErrorClassifier,
    options: &'a FetchOptions,
}

impl<'a> AttemptExecutor<'a> {
    pub fn new(
        engine: &'a dyn FetchEngine,
        classifier: &'a dyn ErrorClassifier,
        options: &'a FetchOptions,
    ) -> Self {
        Self {
            engine,
            classifier,
            options,
        }
    }

    pub async fn execute(&self, request: &FetchRequest) -> AttemptOutcome {
        match self.engine.fetch(request, self.options).await {
            Ok(saved_location) => AttemptOutcome::Success { saved_location },
            Err(failure) => AttemptOutcome::Failure {
                kind: self.classifier.classify(&failure.message),
                raw_message: failure.message,
            },
        }
    }
}
