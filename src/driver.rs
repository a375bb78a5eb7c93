//! The seam between the scrape pipeline and a live browser tab
//!
//! The pipeline only talks to a [`PageDriver`]; [`crate::PageSession`] is the
//! chromiumoxide implementation. Keeping the DOM work behind this trait lets
//! the loader and orchestrator run against scripted pages in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::browser::BrowserResult;

/// A way of finding one clickable control on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Element with the given ARIA role whose accessible name starts with `name`
    Role { role: String, name: String },
    /// First element matching a CSS selector
    Css(String),
}

impl Locator {
    pub fn role(role: &str, name: &str) -> Self {
        Locator::Role {
            role: role.to_string(),
            name: name.to_string(),
        }
    }

    pub fn css(selector: &str) -> Self {
        Locator::Css(selector.to_string())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Role { role, name } => write!(f, "{role} \"{name}\""),
            Locator::Css(selector) => f.write_str(selector),
        }
    }
}

/// Text pulled out of one review card, before any cleaning
///
/// Every field is optional: the card markup varies between review types and
/// between Maps deployments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReviewNode {
    /// `data-review-id` attribute when the card carries one
    #[serde(default)]
    pub review_id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// aria-label of the star widget, e.g. "4 stars"
    #[serde(default)]
    pub rating_label: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub owner_reply: Option<String>,
}

impl RawReviewNode {
    /// Key used by the loader to tell already-delivered cards from new ones
    pub fn node_key(&self) -> String {
        match &self.review_id {
            Some(id) if !id.is_empty() => format!("id:{id}"),
            _ => format!(
                "content:{}\u{1f}{}\u{1f}{}",
                self.author.as_deref().unwrap_or_default(),
                self.date.as_deref().unwrap_or_default(),
                self.text.as_deref().unwrap_or_default()
            ),
        }
    }
}

/// Operations the pipeline needs from one browser tab
///
/// Methods report "nothing matched" through their return value and reserve
/// `Err` for a broken tab or CDP connection.
#[async_trait]
pub trait PageDriver: Send {
    /// Load `url` and return the final URL after redirects
    async fn navigate(&mut self, url: &str) -> BrowserResult<String>;

    /// URL the tab shows right now; `None` before any document loaded
    async fn current_url(&mut self) -> BrowserResult<Option<String>>;

    async fn exists(&mut self, selector: &str) -> BrowserResult<bool>;

    /// Click the first element matching `locator`; `false` when nothing matched
    async fn click(&mut self, locator: &Locator) -> BrowserResult<bool>;

    /// Scroll the first matching container to its current bottom
    ///
    /// Falls back to scrolling the last review card into view. Returns `false`
    /// when neither a container nor a card could be found.
    async fn scroll_to_bottom(&mut self, containers: &[String]) -> BrowserResult<bool>;

    /// Expand truncated review bodies; returns how many were expanded
    async fn expand_truncated(&mut self) -> BrowserResult<usize>;

    /// Snapshot every review card currently in the DOM, in document order
    async fn review_nodes(&mut self) -> BrowserResult<Vec<RawReviewNode>>;

    /// Release the tab and its browser; must be safe to call more than once
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_key_prefers_review_id() {
        let node = RawReviewNode {
            review_id: Some("ChZDSUhN".into()),
            author: Some("Ana".into()),
            ..RawReviewNode::default()
        };
        assert_eq!(node.node_key(), "id:ChZDSUhN");
    }

    #[test]
    fn node_key_falls_back_to_content() {
        let a = RawReviewNode {
            review_id: Some(String::new()),
            author: Some("Ana".into()),
            text: Some("Great".into()),
            ..RawReviewNode::default()
        };
        let b = RawReviewNode {
            author: Some("Ana".into()),
            text: Some("Great".into()),
            ..RawReviewNode::default()
        };
        assert_eq!(a.node_key(), b.node_key());
    }

    #[test]
    fn raw_node_deserializes_with_missing_fields() {
        let node: RawReviewNode =
            serde_json::from_str(r#"{"author": "Ana", "rating_label": null}"#).unwrap();
        assert_eq!(node.author.as_deref(), Some("Ana"));
        assert!(node.rating_label.is_none());
        assert!(node.text.is_none());
    }

    #[test]
    fn locator_display() {
        assert_eq!(Locator::role("tab", "Reviews").to_string(), "tab \"Reviews\"");
        assert_eq!(Locator::css("#menu").to_string(), "#menu");
    }
}
