//! Scrape orchestration
//!
//! `Starting → PanelOpen → Loading → Done`, with an exit to `Failed` from
//! the first two. Failures while starting or opening the panel abort the
//! call; anything that stops loading early still returns the reviews
//! collected so far, flagged with `early_termination`. The page session is
//! closed on every path, including cancellation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dedup::ReviewSet;
use crate::driver::PageDriver;
use crate::error::ScrapeError;
use crate::loader::IncrementalLoader;
use crate::panel::{default_probes, reveal_reviews, sort_newest};
use crate::parser::{ReviewRecord, parse};
use crate::session::{PageSession, navigate_to_place};
use crate::{Config, ScrapeConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Starting,
    PanelOpen,
    Loading,
    Done,
    Failed,
}

/// Why loading stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    /// Two consecutive loads revealed nothing new
    Exhausted,
    IterationCeiling,
    /// One loader iteration ran past its bound
    LoadTimeout,
    /// Whole-call wall clock spent
    PipelineTimeout,
    /// The tab stopped answering mid-load
    BrowserFailure,
}

impl StopReason {
    /// Anything but reaching the target counts as early termination
    pub fn is_early(self) -> bool {
        self != StopReason::TargetReached
    }
}

/// A validated scrape request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub place_url: String,
    pub target_count: usize,
}

impl ScrapeRequest {
    /// Validate a place URL and a positive target count
    ///
    /// A URL that cannot be a Google Maps place is a navigation failure: it
    /// can never load a reviews-capable page.
    pub fn new(place_url: impl Into<String>, target_count: usize) -> Result<Self, ScrapeError> {
        let place_url = place_url.into().trim().to_string();

        if !is_place_url(&place_url) {
            return Err(ScrapeError::navigation(&place_url, "not a Google Maps place URL"));
        }
        if target_count == 0 {
            return Err(ScrapeError::InvalidRequest(
                "review count must be positive".to_string(),
            ));
        }

        Ok(Self {
            place_url,
            target_count,
        })
    }
}

/// Whether `raw` points at Google Maps (full or short link)
pub fn is_place_url(raw: &str) -> bool {
    let Ok(url) = url::Url::parse(raw) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let path = url.path();

    if host == "maps.app.goo.gl" || host.starts_with("maps.google.") {
        return true;
    }
    if host == "goo.gl" {
        return path.starts_with("/maps");
    }

    let host = host.strip_prefix("www.").unwrap_or(&host);
    host.starts_with("google.") && path.starts_with("/maps")
}

/// Ordered, deduplicated reviews from one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub place_url: String,
    /// First-seen order, never longer than the requested count
    pub reviews: Vec<ReviewRecord>,
    pub early_termination: bool,
    pub stop_reason: StopReason,
    /// Loader iterations that touched the page
    pub iterations: usize,
    /// Cards dropped for lacking both author and text
    pub skipped: usize,
    pub scraped_at: DateTime<Utc>,
}

/// Scrape reviews with a browser launched for this call alone
///
/// `config` is validated first; an over-limit `target_count` is rejected
/// before any browser starts.
pub async fn scrape(
    request: &ScrapeRequest,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ScrapeResult, ScrapeError> {
    config.scrape.validate()?;
    if request.target_count > config.scrape.max_review_count {
        return Err(ScrapeError::InvalidRequest(format!(
            "review count {} exceeds the limit of {}",
            request.target_count, config.scrape.max_review_count
        )));
    }

    let mut session = PageSession::launch(&config.browser).await?;
    scrape_with_driver(&mut session, request, &config.scrape, cancel).await
}

/// Run the pipeline on an already launched tab, then close it
///
/// The driver is closed before this returns, whatever the outcome.
pub async fn scrape_with_driver<D>(
    driver: &mut D,
    request: &ScrapeRequest,
    config: &ScrapeConfig,
    cancel: &CancellationToken,
) -> Result<ScrapeResult, ScrapeError>
where
    D: PageDriver + ?Sized,
{
    let mut state = PipelineState::Starting;

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
        outcome = run(driver, request, config, &mut state) => outcome,
    };

    driver.close().await;

    match &outcome {
        Ok(result) => info!(
            url = %request.place_url,
            reviews = result.reviews.len(),
            target = request.target_count,
            stop_reason = ?result.stop_reason,
            early_termination = result.early_termination,
            "Scrape finished"
        ),
        Err(e) => warn!(
            url = %request.place_url,
            failed_in = ?state,
            error = %e,
            "Scrape failed"
        ),
    }

    outcome
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug!(from = ?*state, to = ?next, "Pipeline state change");
    *state = next;
}

async fn run<D>(
    driver: &mut D,
    request: &ScrapeRequest,
    config: &ScrapeConfig,
    state: &mut PipelineState,
) -> Result<ScrapeResult, ScrapeError>
where
    D: PageDriver + ?Sized,
{
    let deadline = Instant::now() + config.pipeline_timeout();
    let target = request.target_count;

    navigate_to_place(driver, &request.place_url, config.navigation_timeout()).await?;
    transition(state, PipelineState::PanelOpen);

    let panel = reveal_reviews(driver, &default_probes(), config.panel_wait()).await?;
    if config.sort_newest && sort_newest(driver, config.panel_wait()).await {
        tokio::time::sleep(config.settle_interval()).await;
    }
    transition(state, PipelineState::Loading);

    let mut reviews = ReviewSet::new();
    let mut skipped = 0;
    let mut loader = IncrementalLoader::new(driver, &panel, config);

    let stop_reason = loop {
        if loader.iterations() >= config.max_iterations {
            break StopReason::IterationCeiling;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break StopReason::PipelineTimeout;
        }

        let batch = match tokio::time::timeout(remaining, loader.next_batch()).await {
            Err(_) => break StopReason::PipelineTimeout,
            Ok(Ok(batch)) => batch,
            Ok(Err(ScrapeError::LoadTimeout { iteration, timeout_ms })) => {
                warn!(iteration, timeout_ms, "Loader iteration timed out, keeping partial results");
                break StopReason::LoadTimeout;
            }
            Ok(Err(ScrapeError::Browser(e))) => {
                warn!(error = %e, "Browser failed while loading, keeping partial results");
                break StopReason::BrowserFailure;
            }
            Ok(Err(other)) => return Err(other),
        };

        let mut candidates = Vec::with_capacity(batch.nodes.len());
        for node in &batch.nodes {
            match parse(node) {
                Ok(record) => candidates.push(record),
                Err(skip) => {
                    skipped += 1;
                    debug!(reason = %skip, "Skipped review card");
                }
            }
        }
        let added = reviews.extend(candidates);

        info!(
            iteration = loader.iterations(),
            new_nodes = batch.nodes.len(),
            added,
            total = reviews.len(),
            target,
            "Loaded reviews"
        );

        if reviews.len() >= target {
            break StopReason::TargetReached;
        }
        if batch.exhausted {
            break StopReason::Exhausted;
        }
    };

    let iterations = loader.iterations();
    reviews.truncate(target);
    transition(state, PipelineState::Done);

    Ok(ScrapeResult {
        place_url: request.place_url.clone(),
        reviews: reviews.into_vec(),
        early_termination: stop_reason.is_early(),
        stop_reason,
        iterations,
        skipped,
        scraped_at: Utc::now(),
    })
}
