//! Per-session browser ownership
//!
//! A [`BrowserWrapper`] owns one Chrome process, the task pumping its CDP
//! event stream and the throwaway profile directory it runs in.

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BrowserError, BrowserResult};
use crate::BrowserConfig;

/// Wrapper for Browser and its event handler task
///
/// Handler MUST be aborted to prevent it running indefinitely after the
/// browser is closed; `Drop` takes care of that when `shutdown` was skipped.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    /// Open a blank tab
    ///
    /// Navigation happens afterwards so the stealth launch flags are in
    /// effect before the target page runs any script.
    pub async fn new_blank_page(&self) -> BrowserResult<Page> {
        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))
    }

    /// Close the browser, wait for the process to exit and remove the profile
    ///
    /// We must call BOTH `close()` and `wait()`: dropping only aborts the
    /// handler task, and without an explicit close Chrome lingers as a zombie.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        self.handler.abort();
        self.cleanup_temp_dir();
    }

    /// Remove the profile directory (blocking)
    ///
    /// MUST run after `browser.wait()` so Chrome has released its file
    /// handles. Blocking `remove_dir_all` because `Drop` may call this too.
    pub fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            debug!("Cleaning up profile directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up profile directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();
        // Browser::drop() kills the Chrome process

        if let Some(path) = &self.user_data_dir {
            warn!(
                "BrowserWrapper dropped without shutdown (cancelled scrape?). \
                 Profile directory will be orphaned: {}",
                path.display()
            );
        }
    }
}

/// Launch a fresh browser for one scrape session
///
/// The profile directory name carries a random uuid so concurrent sessions
/// in one process never contend for Chrome's profile lock.
pub async fn launch_browser(config: &BrowserConfig) -> BrowserResult<BrowserWrapper> {
    let user_data_dir =
        std::env::temp_dir().join(format!("place_reviews_{}", Uuid::new_v4().simple()));

    info!(profile = %user_data_dir.display(), "Launching session browser");

    let (browser, handler) = crate::browser_setup::launch_browser(config, user_data_dir.clone())
        .await
        .map_err(|e| BrowserError::LaunchFailed(format!("{e:#}")))?;

    Ok(BrowserWrapper::new(browser, handler, user_data_dir))
}
