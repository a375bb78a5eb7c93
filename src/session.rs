//! Page session: one browser tab for the duration of one scrape
//!
//! [`PageSession`] is the chromiumoxide-backed [`PageDriver`]. All DOM work
//! runs as small parameterized scripts; arguments are JSON-encoded, never
//! spliced into the script text.

use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::BrowserConfig;
use crate::browser::{BrowserError, BrowserResult, BrowserWrapper, launch_browser};
use crate::driver::{Locator, PageDriver, RawReviewNode};
use crate::error::ScrapeError;
use crate::utils::Backoff;
use crate::utils::constants::{
    AUTHOR_SELECTOR, CONSENT_ACCEPT_SELECTORS, DATE_SELECTOR, EXPAND_SELECTOR,
    PLACE_MARKER_SELECTOR, RATING_SELECTOR, REPLY_CONTAINER_SELECTOR, REVIEW_CARD_SELECTOR,
    TEXT_SELECTOR,
};

const EXISTS_SCRIPT: &str = r#"(selector) => {
    try { return document.querySelector(selector) !== null; } catch (e) { return false; }
}"#;

const CLICK_SCRIPT: &str = r#"(locator) => {
    const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
    let target = null;
    try {
        if (locator.css) {
            target = Array.from(document.querySelectorAll(locator.css)).find(visible) || null;
        } else {
            const want = locator.name.toLowerCase();
            target = Array.from(document.querySelectorAll(`[role="${locator.role}"]`)).find((el) => {
                const label = (el.getAttribute('aria-label') || el.innerText || '').trim().toLowerCase();
                return visible(el) && label.startsWith(want);
            }) || null;
        }
    } catch (e) {
        return false;
    }
    if (!target) return false;
    target.scrollIntoView({ block: 'center' });
    target.click();
    return true;
}"#;

const SCROLL_SCRIPT: &str = r#"(containers, cardSelector) => {
    for (const selector of containers) {
        let el = null;
        try { el = document.querySelector(selector); } catch (e) { continue; }
        if (el && el.scrollHeight > el.clientHeight) {
            el.scrollTop = el.scrollHeight;
            return true;
        }
    }
    const cards = document.querySelectorAll(cardSelector);
    if (cards.length === 0) return false;
    cards[cards.length - 1].scrollIntoView({ block: 'end' });
    return true;
}"#;

const EXPAND_SCRIPT: &str = r#"(selector) => {
    let expanded = 0;
    document.querySelectorAll(selector).forEach((button) => { button.click(); expanded += 1; });
    return expanded;
}"#;

const SNAPSHOT_SCRIPT: &str = r#"(s) => {
    const clean = (el) => {
        if (!el) return null;
        const t = (el.innerText || el.textContent || '').trim();
        return t.length ? t : null;
    };
    const all = Array.from(document.querySelectorAll(s.card));
    const cards = all.filter((el) => !all.some((other) => other !== el && other.contains(el)));
    return cards.map((card) => {
        const reply = card.querySelector(s.reply);
        const body = Array.from(card.querySelectorAll(s.text)).find((el) => !(reply && reply.contains(el)));
        const stars = card.querySelector(s.rating);
        let replyText = null;
        if (reply) {
            replyText = clean(reply.querySelector(s.text)) || clean(reply);
        }
        return {
            review_id: card.getAttribute('data-review-id'),
            author: clean(card.querySelector(s.author)),
            rating_label: stars ? stars.getAttribute('aria-label') : null,
            date: clean(card.querySelector(s.date)),
            text: clean(body),
            owner_reply: replyText,
        };
    });
}"#;

/// What the tab landed on after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingKind {
    /// A Maps URL that may render a place
    Maps,
    /// Cookie consent interstitial
    Consent,
    /// Anti-automation "unusual traffic" page
    Blocked,
    /// Anything else (search result page, error page, other site)
    Other,
}

/// Classify the final URL reached after redirects
pub fn classify_landing(final_url: &str) -> LandingKind {
    let Ok(url) = url::Url::parse(final_url) else {
        return LandingKind::Other;
    };
    let host = url.host_str().unwrap_or_default();
    let path = url.path();

    if host.starts_with("consent.") {
        LandingKind::Consent
    } else if path.starts_with("/sorry") {
        LandingKind::Blocked
    } else if path.starts_with("/maps") || host.starts_with("maps.") {
        LandingKind::Maps
    } else {
        LandingKind::Other
    }
}

/// Navigate `driver` to a place page and wait until the place has rendered
///
/// Every failure here is a [`ScrapeError::Navigation`]; the caller owns
/// closing the session.
pub async fn navigate_to_place<D>(
    driver: &mut D,
    url: &str,
    timeout: Duration,
) -> Result<String, ScrapeError>
where
    D: PageDriver + ?Sized,
{
    let mut backoff = Backoff::new(timeout);

    let mut final_url = tokio::time::timeout(timeout, driver.navigate(url))
        .await
        .map_err(|_| {
            ScrapeError::navigation(url, format!("page did not load within {}ms", timeout.as_millis()))
        })?
        .map_err(|e| ScrapeError::navigation(url, e.to_string()))?;

    if classify_landing(&final_url) == LandingKind::Consent {
        info!("Landed on consent page, accepting");
        final_url = accept_consent(driver, url, &mut backoff).await?;
    }

    match classify_landing(&final_url) {
        LandingKind::Maps => {}
        LandingKind::Blocked => {
            return Err(ScrapeError::navigation(url, "blocked by an unusual-traffic check"));
        }
        LandingKind::Consent | LandingKind::Other => {
            return Err(ScrapeError::navigation(
                url,
                format!("redirected to a non-place page: {final_url}"),
            ));
        }
    }

    loop {
        match driver.exists(PLACE_MARKER_SELECTOR).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => return Err(ScrapeError::navigation(url, e.to_string())),
        }
        if !backoff.wait().await {
            return Err(ScrapeError::navigation(
                url,
                format!("no place rendered at {final_url}"),
            ));
        }
    }

    debug!(final_url = %final_url, "Place page ready");
    Ok(final_url)
}

/// Click through the consent interstitial and return where the tab went
async fn accept_consent<D>(driver: &mut D, url: &str, backoff: &mut Backoff) -> Result<String, ScrapeError>
where
    D: PageDriver + ?Sized,
{
    for selector in CONSENT_ACCEPT_SELECTORS {
        match driver.click(&Locator::css(selector)).await {
            Ok(true) => break,
            Ok(false) => continue,
            Err(e) => return Err(ScrapeError::navigation(url, e.to_string())),
        }
    }

    loop {
        if !backoff.wait().await {
            return Err(ScrapeError::navigation(url, "stuck on consent page"));
        }
        match driver.current_url().await {
            Ok(Some(current)) if classify_landing(&current) != LandingKind::Consent => {
                debug!(current = %current, "Left consent page");
                return Ok(current);
            }
            Ok(_) => {}
            Err(e) => return Err(ScrapeError::navigation(url, e.to_string())),
        }
    }
}

/// One browser plus one tab, owned by a single scrape call
pub struct PageSession {
    wrapper: Option<BrowserWrapper>,
    page: Option<Page>,
}

impl PageSession {
    /// Launch a dedicated browser and open a blank tab
    pub async fn launch(config: &BrowserConfig) -> Result<Self, ScrapeError> {
        let mut wrapper = launch_browser(config)
            .await
            .map_err(|e| ScrapeError::BrowserUnavailable(e.to_string()))?;

        let page = match wrapper.new_blank_page().await {
            Ok(page) => page,
            Err(e) => {
                wrapper.shutdown().await;
                return Err(e.into());
            }
        };

        Ok(Self {
            wrapper: Some(wrapper),
            page: Some(page),
        })
    }

    fn page(&self) -> BrowserResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::PageCreationFailed("session already closed".into()))
    }
}

/// Call `function` with JSON-encoded `args` and deserialize its return value
async fn call<T: DeserializeOwned>(page: &Page, function: &str, args: &[Value]) -> BrowserResult<T> {
    let args = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let params = EvaluateParams::builder()
        .expression(format!("({function})({args})"))
        .return_by_value(true)
        .await_promise(true)
        .build()
        .map_err(BrowserError::Evaluation)?;

    page.evaluate(params)
        .await
        .map_err(|e| BrowserError::Evaluation(e.to_string()))?
        .into_value::<T>()
        .map_err(|e| BrowserError::Evaluation(e.to_string()))
}

#[async_trait]
impl PageDriver for PageSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<String> {
        let page = self.page()?.clone();
        page.goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;

        let final_url = page
            .url()
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?
            .unwrap_or_else(|| url.to_string());
        Ok(final_url)
    }

    async fn current_url(&mut self) -> BrowserResult<Option<String>> {
        let page = self.page()?.clone();
        page.url()
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))
    }

    async fn exists(&mut self, selector: &str) -> BrowserResult<bool> {
        call(&self.page()?.clone(), EXISTS_SCRIPT, &[json!(selector)]).await
    }

    async fn click(&mut self, locator: &Locator) -> BrowserResult<bool> {
        let arg = match locator {
            Locator::Role { role, name } => json!({ "role": role, "name": name }),
            Locator::Css(selector) => json!({ "css": selector }),
        };
        call(&self.page()?.clone(), CLICK_SCRIPT, &[arg]).await
    }

    async fn scroll_to_bottom(&mut self, containers: &[String]) -> BrowserResult<bool> {
        call(
            &self.page()?.clone(),
            SCROLL_SCRIPT,
            &[json!(containers), json!(REVIEW_CARD_SELECTOR)],
        )
        .await
    }

    async fn expand_truncated(&mut self) -> BrowserResult<usize> {
        call(&self.page()?.clone(), EXPAND_SCRIPT, &[json!(EXPAND_SELECTOR)]).await
    }

    async fn review_nodes(&mut self) -> BrowserResult<Vec<RawReviewNode>> {
        let selectors = json!({
            "card": REVIEW_CARD_SELECTOR,
            "author": AUTHOR_SELECTOR,
            "rating": RATING_SELECTOR,
            "date": DATE_SELECTOR,
            "text": TEXT_SELECTOR,
            "reply": REPLY_CONTAINER_SELECTOR,
        });
        call(&self.page()?.clone(), SNAPSHOT_SCRIPT, &[selectors]).await
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            debug!("Page close failed (browser may already be gone): {}", e);
        }

        if let Some(mut wrapper) = self.wrapper.take() {
            info!("Closing session browser");
            wrapper.shutdown().await;
        }
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        if self.wrapper.is_some() {
            warn!("PageSession dropped while open; killing browser without graceful close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_landing_pages() {
        assert_eq!(
            classify_landing("https://www.google.com/maps/place/Cafe/@1,2,17z/data=!4m6"),
            LandingKind::Maps
        );
        assert_eq!(
            classify_landing("https://consent.google.com/m?continue=https://www.google.com/maps"),
            LandingKind::Consent
        );
        assert_eq!(
            classify_landing("https://www.google.com/sorry/index?continue=x"),
            LandingKind::Blocked
        );
        assert_eq!(classify_landing("https://www.google.com/search?q=cafe"), LandingKind::Other);
        assert_eq!(classify_landing("about:blank"), LandingKind::Other);
        assert_eq!(classify_landing("not a url"), LandingKind::Other);
    }

    #[test]
    fn scripts_are_single_function_expressions() {
        for script in [EXISTS_SCRIPT, CLICK_SCRIPT, SCROLL_SCRIPT, EXPAND_SCRIPT, SNAPSHOT_SCRIPT] {
            assert!(script.starts_with('('));
            assert!(script.trim_end().ends_with('}'));
        }
    }
}
