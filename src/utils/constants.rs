//! Shared configuration constants for the review scraper
//!
//! Selectors target the Google Maps place page. Its class names are
//! obfuscated and change without notice, so each concern carries a list of
//! alternatives tried in order.

/// Chrome user agent string for stealth mode
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Accessible name of the reviews tab
pub const REVIEWS_TAB_NAME: &str = "Reviews";

/// CSS fallbacks for the reviews entry point, after the tab probe
pub const REVIEWS_ENTRY_SELECTORS: &[&str] = &[
    "button[role='tab'][aria-label*='Reviews']",
    "button[jsaction*='pane.reviewChart.moreReviews']",
    "button[aria-label*='reviews' i]",
];

/// One review card
pub const REVIEW_CARD_SELECTOR: &str = "div.jftiEf[data-review-id], div[class*='jJc9Ad']";

pub const AUTHOR_SELECTOR: &str = "div[class*='d4r55']";
pub const RATING_SELECTOR: &str = "span[role='img'][aria-label], span[aria-label*='star' i]";
pub const DATE_SELECTOR: &str = "span[class*='rsqaWe']";
pub const TEXT_SELECTOR: &str = "span[class*='wiI7pd']";
/// Owner response block inside a card
pub const REPLY_CONTAINER_SELECTOR: &str = "div[class*='CDe7pd']";

/// "More" buttons that expand truncated review bodies
pub const EXPAND_SELECTOR: &str = "button.w8nwRe, button[aria-label='See more']";

/// Scrollable container holding the review cards
pub const SCROLL_CONTAINER_SELECTORS: &[&str] = &[
    "div.m6QErb.DxyBCb.kA9KIf.dS8AEf",
    "div.m6QErb[tabindex='-1']",
    "div[role='main'] div.m6QErb",
];

pub const SORT_BUTTON_SELECTOR: &str =
    "button[aria-label*='Sort' i], button[data-value='Sort']";
/// Second entry of the sort menu is "Newest"
pub const SORT_NEWEST_SELECTOR: &str = "#action-menu [data-index='1']";

/// Consent interstitial "Accept all" buttons
pub const CONSENT_ACCEPT_SELECTORS: &[&str] = &[
    "button[aria-label='Accept all']",
    "form[action*='consent'] button",
];

/// Marker present on a rendered place page
pub const PLACE_MARKER_SELECTOR: &str = "h1.DUwDvf, div[role='main'] h1";
