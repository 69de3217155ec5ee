use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Error type for evidence loading and corpus computations.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// A website lacks an input required by the computation.
    #[error("missing evidence for '{website}': {missing}")]
    MissingEvidence { website: String, missing: String },
    /// A statistic or ratio is undefined for the given input.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AnalysisError {
    pub fn missing(website: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::MissingEvidence {
            website: website.into(),
            missing: missing.into(),
        }
    }

    pub fn degenerate(what: impl Into<String>) -> Self {
        Self::DegenerateInput(what.into())
    }
}

/// A recoverable per-website problem, recorded instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub website: String,
    pub message: String,
}

impl Diagnostic {
    pub fn from_error(website: impl Into<String>, err: &AnalysisError) -> Self {
        Self {
            website: website.into(),
            message: err.to_string(),
        }
    }
}
