//! Place review extraction for chat assistants
//!
//! Drives a headless Chromium through a Google Maps place page, reveals the
//! reviews panel, scrolls it until enough reviews are loaded and returns them
//! as cleaned, deduplicated records in first-seen order.

mod browser;
pub mod browser_setup;
pub mod dedup;
pub mod driver;
mod error;
pub mod loader;
pub mod panel;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod session;
mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub scrape: ScrapeConfig,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default)]
    pub disable_security: bool,

    /// Explicit Chromium executable; `CHROMIUM_PATH` takes precedence
    #[serde(default)]
    pub chromium_path: Option<PathBuf>,

    /// CDP request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Bounds for one scrape call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// How long the panel opener keeps probing before giving up
    #[serde(default = "default_panel_wait_ms")]
    pub panel_wait_ms: u64,

    /// Pause after each scroll so the list can render
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Random extra pause added to `settle_ms`
    #[serde(default = "default_settle_jitter_ms")]
    pub settle_jitter_ms: u64,

    #[serde(default = "default_iteration_timeout_ms")]
    pub iteration_timeout_ms: u64,

    /// Wall clock for the whole call; exceeding it ends loading early
    #[serde(default = "default_pipeline_timeout_ms")]
    pub pipeline_timeout_ms: u64,

    /// Hard ceiling on loader iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Consecutive empty batches that count as end of list
    #[serde(default = "default_idle_batches")]
    pub idle_batches_for_exhaustion: usize,

    #[serde(default = "default_sort_newest")]
    pub sort_newest: bool,

    #[serde(default = "default_review_count")]
    pub default_review_count: usize,

    #[serde(default = "default_max_review_count")]
    pub max_review_count: usize,
}

fn default_headless() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    900
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}
fn default_panel_wait_ms() -> u64 {
    10_000
}
fn default_settle_ms() -> u64 {
    2_000
}
fn default_settle_jitter_ms() -> u64 {
    500
}
fn default_iteration_timeout_ms() -> u64 {
    15_000
}
fn default_pipeline_timeout_ms() -> u64 {
    180_000
}
fn default_max_iterations() -> usize {
    60
}
fn default_idle_batches() -> usize {
    2
}
fn default_sort_newest() -> bool {
    true
}
fn default_review_count() -> usize {
    20
}
fn default_max_review_count() -> usize {
    500
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: false,
            chromium_path: None,
            request_timeout_ms: default_request_timeout_ms(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: default_navigation_timeout_ms(),
            panel_wait_ms: default_panel_wait_ms(),
            settle_ms: default_settle_ms(),
            settle_jitter_ms: default_settle_jitter_ms(),
            iteration_timeout_ms: default_iteration_timeout_ms(),
            pipeline_timeout_ms: default_pipeline_timeout_ms(),
            max_iterations: default_max_iterations(),
            idle_batches_for_exhaustion: default_idle_batches(),
            sort_newest: default_sort_newest(),
            default_review_count: default_review_count(),
            max_review_count: default_max_review_count(),
        }
    }
}

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "PLACE_REVIEWS_CONFIG";

/// Load config from `$PLACE_REVIEWS_CONFIG`, else config.yaml in package root
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = match std::env::var_os(CONFIG_ENV) {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml"),
    };

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.scrape.validate()?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

pub use browser::{BrowserError, BrowserResult, BrowserWrapper, launch_browser};
pub use dedup::{ReviewSet, fold};
pub use driver::{PageDriver, RawReviewNode};
pub use error::ScrapeError;
pub use loader::{Batch, IncrementalLoader};
pub use panel::{PanelHandle, PanelProbe, reveal_reviews};
pub use parser::{ParseSkip, ReviewRecord, parse};
pub use pipeline::{
    PipelineState, ScrapeRequest, ScrapeResult, StopReason, scrape, scrape_with_driver,
};
pub use session::PageSession;
