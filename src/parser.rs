//! Review card parsing
//!
//! Each field is extracted on its own and falls back to a sentinel, so one
//! odd card never fails the batch it arrived in. A card is only dropped when
//! it has neither an author nor any text to derive an identity from.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

use crate::driver::RawReviewNode;

/// Author shown when the card has no readable name
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// One cleaned review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Hex digest of author, date and body; equal identities are the same review
    pub identity: String,
    pub author: String,
    /// 1 to 5 stars, `None` when the widget was missing or unreadable
    pub rating: Option<u8>,
    /// Timestamp as displayed, e.g. "a month ago"
    pub date: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_reply: Option<String>,
}

/// Why a card produced no record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSkip {
    /// No author and no body text
    NoIdentity,
}

impl fmt::Display for ParseSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseSkip::NoIdentity => f.write_str("card has neither author nor text"),
        }
    }
}

/// Convert one raw card into a record
pub fn parse(node: &RawReviewNode) -> Result<ReviewRecord, ParseSkip> {
    let author = node.author.as_deref().map(clean_text).unwrap_or_default();
    let text = node.text.as_deref().map(clean_text).unwrap_or_default();

    if author.is_empty() && text.is_empty() {
        return Err(ParseSkip::NoIdentity);
    }

    let date = node
        .date
        .as_deref()
        .map(collapse_whitespace)
        .unwrap_or_default();
    let rating = node.rating_label.as_deref().and_then(parse_rating);
    let owner_reply = node
        .owner_reply
        .as_deref()
        .map(clean_text)
        .filter(|reply| !reply.is_empty());

    let author = if author.is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        author
    };

    Ok(ReviewRecord {
        identity: review_identity(&author, &date, &text),
        author,
        rating,
        date,
        text,
        owner_reply,
    })
}

/// Stable identity for a review that has no site-provided id
///
/// Two distinct reviews with the same author, date and body collapse into one.
pub fn review_identity(author: &str, date: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(author.as_bytes());
    hasher.update([0x1f]);
    hasher.update(date.as_bytes());
    hasher.update([0x1f]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// Star count from an aria-label such as "4 stars" or "Rated 4.0 out of 5"
pub fn parse_rating(label: &str) -> Option<u8> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let number = NUMBER.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid regex"));

    let first = number.find(label)?.as_str().replace(',', ".");
    let value: f32 = first.parse().ok()?;
    let stars = value.round();
    (1.0..=5.0).contains(&stars).then_some(stars as u8)
}

/// Strip emoji and collapse whitespace runs
pub fn clean_text(raw: &str) -> String {
    static EMOJI: OnceLock<Regex> = OnceLock::new();
    let emoji = EMOJI.get_or_init(|| {
        Regex::new(r"[\p{Extended_Pictographic}\p{Emoji_Modifier}\x{FE0F}\x{200D}\x{20E3}]")
            .expect("valid regex")
    });
    collapse_whitespace(&emoji.replace_all(raw, " "))
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
