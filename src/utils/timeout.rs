//! Timeout validation for scrape bounds

use std::time::Duration;

use crate::ScrapeConfig;
use crate::error::ScrapeError;

/// Maximum timeout for page navigation (5 minutes)
/// Covers slow-loading sites, heavy SPAs, and network delays
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000;

/// Maximum timeout for a single loader iteration (60 seconds)
pub const MAX_ITERATION_TIMEOUT_MS: u64 = 60_000;

impl ScrapeConfig {
    /// Reject bounds that would make the pipeline hang or never load anything
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.navigation_timeout_ms == 0 || self.navigation_timeout_ms > MAX_NAVIGATION_TIMEOUT_MS {
            return Err(ScrapeError::InvalidRequest(format!(
                "navigation_timeout_ms must be within 1..={}ms ({} minutes). Received: {}ms",
                MAX_NAVIGATION_TIMEOUT_MS,
                MAX_NAVIGATION_TIMEOUT_MS / 60_000,
                self.navigation_timeout_ms
            )));
        }

        if self.iteration_timeout_ms == 0 || self.iteration_timeout_ms > MAX_ITERATION_TIMEOUT_MS {
            return Err(ScrapeError::InvalidRequest(format!(
                "iteration_timeout_ms must be within 1..={}ms ({} seconds). Received: {}ms",
                MAX_ITERATION_TIMEOUT_MS,
                MAX_ITERATION_TIMEOUT_MS / 1000,
                self.iteration_timeout_ms
            )));
        }

        if self.settle_ms >= self.iteration_timeout_ms {
            return Err(ScrapeError::InvalidRequest(format!(
                "settle_ms ({}) must be shorter than iteration_timeout_ms ({})",
                self.settle_ms, self.iteration_timeout_ms
            )));
        }

        if self.pipeline_timeout_ms == 0 {
            return Err(ScrapeError::InvalidRequest(
                "pipeline_timeout_ms must be positive".to_string(),
            ));
        }

        if self.max_iterations == 0 {
            return Err(ScrapeError::InvalidRequest(
                "max_iterations must be positive".to_string(),
            ));
        }

        if self.idle_batches_for_exhaustion == 0 {
            return Err(ScrapeError::InvalidRequest(
                "idle_batches_for_exhaustion must be at least 1".to_string(),
            ));
        }

        if self.max_review_count == 0 || self.default_review_count > self.max_review_count {
            return Err(ScrapeError::InvalidRequest(format!(
                "default_review_count ({}) must be within 1..=max_review_count ({})",
                self.default_review_count, self.max_review_count
            )));
        }

        Ok(())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn panel_wait(&self) -> Duration {
        Duration::from_millis(self.panel_wait_ms)
    }

    pub fn iteration_timeout(&self) -> Duration {
        Duration::from_millis(self.iteration_timeout_ms)
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline_timeout_ms)
    }

    /// Settle interval with random jitter applied
    pub fn settle_interval(&self) -> Duration {
        let jitter = if self.settle_jitter_ms == 0 {
            0
        } else {
            rand::random_range(0..=self.settle_jitter_ms)
        };
        Duration::from_millis(self.settle_ms + jitter)
    }
}
