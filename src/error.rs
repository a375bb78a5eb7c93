use thiserror::Error;

use crate::browser::BrowserError;

/// Errors surfaced by a `scrape` call
///
/// Only `LoadTimeout` is transient: the orchestrator turns it into early
/// termination with whatever reviews were collected. Every other kind aborts
/// the call after the page session has been closed.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("reviews panel not found (tried: {})", tried.join(", "))]
    PanelNotFound { tried: Vec<String> },

    #[error("loader iteration {iteration} exceeded {timeout_ms}ms")]
    LoadTimeout { iteration: usize, timeout_ms: u64 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("scrape cancelled")]
    Cancelled,

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl ScrapeError {
    /// Whether this error aborts the call instead of degrading the result
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScrapeError::LoadTimeout { .. })
    }

    pub(crate) fn navigation(url: &str, reason: impl Into<String>) -> Self {
        ScrapeError::Navigation {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}
