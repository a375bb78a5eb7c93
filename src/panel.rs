//! Reviews panel opener
//!
//! The place page only lists a handful of reviews inline; the full list lives
//! in a separate panel behind the "Reviews" tab. The tab's markup is not a
//! stable contract, so it is located through an ordered list of probes and
//! the first one that clicks wins.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::driver::{Locator, PageDriver};
use crate::error::ScrapeError;
use crate::utils::Backoff;
use crate::utils::constants::{
    REVIEW_CARD_SELECTOR, REVIEWS_ENTRY_SELECTORS, REVIEWS_TAB_NAME, SCROLL_CONTAINER_SELECTORS,
    SORT_BUTTON_SELECTOR, SORT_NEWEST_SELECTOR,
};

/// One strategy for locating the reviews entry point
pub type PanelProbe = Locator;

/// An opened reviews panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelHandle {
    /// Probe that opened the panel
    pub opened_by: PanelProbe,
    /// Candidate scrollable containers, most specific first
    pub scroll_containers: Vec<String>,
    /// Whether review cards were visible when the opener returned
    pub cards_visible: bool,
}

/// Probes in priority order: the accessible tab, then CSS fallbacks
pub fn default_probes() -> Vec<PanelProbe> {
    std::iter::once(Locator::role("tab", REVIEWS_TAB_NAME))
        .chain(REVIEWS_ENTRY_SELECTORS.iter().map(|s| Locator::css(s)))
        .collect()
}

/// Open the reviews panel using the first probe that matches within `wait`
///
/// Each round tries every probe in order, then backs off. Gives up with
/// [`ScrapeError::PanelNotFound`] once `wait` is spent; this is not retried.
pub async fn reveal_reviews<D>(
    driver: &mut D,
    probes: &[PanelProbe],
    wait: Duration,
) -> Result<PanelHandle, ScrapeError>
where
    D: PageDriver + ?Sized,
{
    let mut backoff = Backoff::new(wait);

    let opened_by = 'probing: loop {
        for probe in probes {
            if driver.click(probe).await? {
                info!(probe = %probe, "Opened reviews panel");
                break 'probing probe.clone();
            }
            debug!(probe = %probe, "Panel probe did not match");
        }

        if !backoff.wait().await {
            return Err(ScrapeError::PanelNotFound {
                tried: probes.iter().map(ToString::to_string).collect(),
            });
        }
    };

    // The tab switch is animated; give the first cards the rest of the budget
    let mut cards_visible = driver.exists(REVIEW_CARD_SELECTOR).await?;
    while !cards_visible && backoff.wait().await {
        cards_visible = driver.exists(REVIEW_CARD_SELECTOR).await?;
    }
    if !cards_visible {
        warn!(probe = %opened_by, "Reviews panel opened but no review cards rendered");
    }

    Ok(PanelHandle {
        opened_by,
        scroll_containers: SCROLL_CONTAINER_SELECTORS
            .iter()
            .map(|s| s.to_string())
            .collect(),
        cards_visible,
    })
}

/// Switch the list to newest-first; best-effort
///
/// Returns whether the sort was applied. Failures are logged, never raised:
/// an unsorted list is still a usable list.
pub async fn sort_newest<D>(driver: &mut D, wait: Duration) -> bool
where
    D: PageDriver + ?Sized,
{
    let sort_button = Locator::css(SORT_BUTTON_SELECTOR);
    let newest = Locator::css(SORT_NEWEST_SELECTOR);

    match driver.click(&sort_button).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("Sort control not found, keeping default review order");
            return false;
        }
        Err(e) => {
            warn!(error = %e, "Sort control click failed, keeping default review order");
            return false;
        }
    }

    let mut backoff = Backoff::new(wait);
    loop {
        match driver.click(&newest).await {
            Ok(true) => {
                info!("Sorted reviews by newest");
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "Sort menu click failed, keeping default review order");
                return false;
            }
        }
        if !backoff.wait().await {
            warn!("Sort menu did not open, keeping default review order");
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserError, BrowserResult};
    use crate::driver::RawReviewNode;
    use async_trait::async_trait;

    /// Driver whose clickable controls appear after a number of click attempts
    #[derive(Default)]
    struct ClickDriver {
        clickable: Vec<(Locator, usize)>,
        attempts: usize,
        cards: bool,
        broken: bool,
        clicked: Vec<Locator>,
    }

    #[async_trait]
    impl PageDriver for ClickDriver {
        async fn navigate(&mut self, url: &str) -> BrowserResult<String> {
            Ok(url.to_string())
        }
        async fn current_url(&mut self) -> BrowserResult<Option<String>> {
            Ok(None)
        }
        async fn exists(&mut self, _selector: &str) -> BrowserResult<bool> {
            Ok(self.cards)
        }
        async fn click(&mut self, locator: &Locator) -> BrowserResult<bool> {
            if self.broken {
                return Err(BrowserError::Evaluation("target closed".into()));
            }
            self.attempts += 1;
            let hit = self
                .clickable
                .iter()
                .any(|(l, after)| l == locator && self.attempts > *after);
            if hit {
                self.clicked.push(locator.clone());
            }
            Ok(hit)
        }
        async fn scroll_to_bottom(&mut self, _containers: &[String]) -> BrowserResult<bool> {
            Ok(true)
        }
        async fn expand_truncated(&mut self) -> BrowserResult<usize> {
            Ok(0)
        }
        async fn review_nodes(&mut self) -> BrowserResult<Vec<RawReviewNode>> {
            Ok(Vec::new())
        }
        async fn close(&mut self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn primary_probe_wins() {
        let probes = default_probes();
        let mut driver = ClickDriver {
            clickable: vec![(probes[0].clone(), 0), (probes[1].clone(), 0)],
            cards: true,
            ..ClickDriver::default()
        };
        let handle = reveal_reviews(&mut driver, &probes, Duration::from_secs(5)).await.unwrap();
        assert_eq!(handle.opened_by, probes[0]);
        assert!(handle.cards_visible);
        assert_eq!(driver.clicked, vec![probes[0].clone()]);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_later_probe() {
        let probes = default_probes();
        let fallback = probes.last().unwrap().clone();
        let mut driver = ClickDriver {
            clickable: vec![(fallback.clone(), 0)],
            cards: true,
            ..ClickDriver::default()
        };
        let handle = reveal_reviews(&mut driver, &probes, Duration::from_secs(5)).await.unwrap();
        assert_eq!(handle.opened_by, fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_late_rendering_tab() {
        let probes = vec![Locator::role("tab", "Reviews")];
        let mut driver = ClickDriver {
            clickable: vec![(probes[0].clone(), 3)],
            cards: true,
            ..ClickDriver::default()
        };
        let handle = reveal_reviews(&mut driver, &probes, Duration::from_secs(5)).await.unwrap();
        assert_eq!(handle.opened_by, probes[0]);
        assert_eq!(driver.attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_all_probes_when_nothing_matches() {
        let probes = default_probes();
        let mut driver = ClickDriver::default();
        let err = reveal_reviews(&mut driver, &probes, Duration::from_secs(2)).await.unwrap_err();
        match err {
            ScrapeError::PanelNotFound { tried } => assert_eq!(tried.len(), probes.len()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn opened_panel_without_cards_is_not_an_error() {
        let probes = vec![Locator::role("tab", "Reviews")];
        let mut driver = ClickDriver {
            clickable: vec![(probes[0].clone(), 0)],
            ..ClickDriver::default()
        };
        let handle = reveal_reviews(&mut driver, &probes, Duration::from_secs(1)).await.unwrap();
        assert!(!handle.cards_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn broken_tab_surfaces_browser_error() {
        let mut driver = ClickDriver {
            broken: true,
            ..ClickDriver::default()
        };
        let err = reveal_reviews(&mut driver, &default_probes(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Browser(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn sort_is_best_effort() {
        let mut missing = ClickDriver::default();
        assert!(!sort_newest(&mut missing, Duration::from_secs(1)).await);

        let mut present = ClickDriver {
            clickable: vec![
                (Locator::css(SORT_BUTTON_SELECTOR), 0),
                (Locator::css(SORT_NEWEST_SELECTOR), 0),
            ],
            ..ClickDriver::default()
        };
        assert!(sort_newest(&mut present, Duration::from_secs(1)).await);
    }
}
