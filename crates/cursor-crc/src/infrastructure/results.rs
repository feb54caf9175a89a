//! JSON results report.
//!
//! ```json
//! {
//!   "max_cursor": 256,
//!   "summary": { "passed": 5, "skipped": 1, "failed": 0 },
//!   "subtests": [
//!     { "name": "cursor-64-onscreen", "result": "pass", "combinations": 3, "probes": 108 },
//!     { "name": "cursor-64-offscreen", "result": "skip", "reason": "..." }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::application::run_subtests::{RunSummary, SubtestReport};

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("I/O error writing results to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The document written by `--results`.
#[derive(Debug, Serialize)]
pub struct ResultsDocument<'a> {
    pub max_cursor: u32,
    pub summary: RunSummary,
    pub subtests: &'a [SubtestReport],
}

impl<'a> ResultsDocument<'a> {
    pub fn new(max_cursor: u32, subtests: &'a [SubtestReport]) -> Self {
        Self {
            max_cursor,
            summary: RunSummary::from_reports(subtests),
            subtests,
        }
    }
}

/// Renders `doc` as pretty-printed JSON.
pub fn render_results(doc: &ResultsDocument<'_>) -> Result<String, ResultsError> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Writes `doc` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`ResultsError::Io`] if the file cannot be written.
pub fn write_results(path: &Path, doc: &ResultsDocument<'_>) -> Result<(), ResultsError> {
    let content = render_results(doc)?;
    std::fs::write(path, content).map_err(|source| ResultsError::Io {
        path: path.to_path_buf(),
        source,
    })
}
