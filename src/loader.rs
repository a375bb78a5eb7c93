//! Incremental loading of the virtualized reviews list
//!
//! The panel renders roughly ten cards at a time and fetches more when its
//! scroll container nears the bottom. [`IncrementalLoader`] is a pull-based
//! generator over that behaviour: every [`IncrementalLoader::next_batch`]
//! call scrolls once, lets the list settle and returns only the cards it has
//! not handed out before.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, trace};

use crate::ScrapeConfig;
use crate::driver::{PageDriver, RawReviewNode};
use crate::error::ScrapeError;
use crate::panel::PanelHandle;

/// Cards revealed by one loader iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Cards not delivered by any earlier batch, in document order
    pub nodes: Vec<RawReviewNode>,
    /// The list stopped growing; further calls return empty batches
    pub exhausted: bool,
}

pub struct IncrementalLoader<'a, D: PageDriver + ?Sized> {
    driver: &'a mut D,
    containers: Vec<String>,
    config: ScrapeConfig,
    delivered: HashSet<String>,
    idle_streak: usize,
    iterations: usize,
    exhausted: bool,
}

impl<'a, D: PageDriver + ?Sized> IncrementalLoader<'a, D> {
    pub fn new(driver: &'a mut D, panel: &PanelHandle, config: &ScrapeConfig) -> Self {
        Self {
            driver,
            containers: panel.scroll_containers.clone(),
            config: config.clone(),
            delivered: HashSet::new(),
            idle_streak: 0,
            iterations: 0,
            exhausted: false,
        }
    }

    /// Number of `next_batch` calls that touched the page
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Perform one load-more interaction and return the newly revealed cards
    ///
    /// `exhausted` turns true after `idle_batches_for_exhaustion` consecutive
    /// iterations without new cards, so one slow network tick is not taken
    /// for the end of the list. An iteration running past
    /// `iteration_timeout_ms` yields [`ScrapeError::LoadTimeout`].
    pub async fn next_batch(&mut self) -> Result<Batch, ScrapeError> {
        if self.exhausted {
            return Ok(Batch {
                nodes: Vec::new(),
                exhausted: true,
            });
        }

        self.iterations += 1;
        let iteration = self.iterations;
        let timeout_ms = self.config.iteration_timeout_ms;
        let timeout = self.config.iteration_timeout();
        let settle = self.config.settle_interval();

        let snapshot = tokio::time::timeout(timeout, self.load_once(settle))
            .await
            .map_err(|_| ScrapeError::LoadTimeout {
                iteration,
                timeout_ms,
            })??;

        let total_in_dom = snapshot.len();
        let nodes: Vec<RawReviewNode> = snapshot
            .into_iter()
            .filter(|node| self.delivered.insert(node.node_key()))
            .collect();

        if nodes.is_empty() {
            self.idle_streak += 1;
        } else {
            self.idle_streak = 0;
        }
        self.exhausted = self.idle_streak >= self.config.idle_batches_for_exhaustion;

        debug!(
            iteration,
            new_nodes = nodes.len(),
            total_in_dom,
            idle_streak = self.idle_streak,
            exhausted = self.exhausted,
            "Loader iteration complete"
        );

        Ok(Batch {
            nodes,
            exhausted: self.exhausted,
        })
    }

    async fn load_once(&mut self, settle: Duration) -> Result<Vec<RawReviewNode>, ScrapeError> {
        if !self.driver.scroll_to_bottom(&self.containers).await? {
            trace!("No scroll container or review card to scroll");
        }
        tokio::time::sleep(settle).await;

        let expanded = self.driver.expand_truncated().await?;
        if expanded > 0 {
            trace!(expanded, "Expanded truncated reviews");
        }

        Ok(self.driver.review_nodes().await?)
    }
}
