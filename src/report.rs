//! Output projections of a [`ScrapeResult`]
//!
//! The chat tool hands the model a summarization prompt followed by one
//! `==REVIEW n==` block per review. Spreadsheet sinks take [`ReviewRecord::row`].

use serde::Serialize;
use std::fmt::Write;

use crate::parser::ReviewRecord;
use crate::pipeline::{ScrapeResult, StopReason};

/// Instruction placed before the review blocks
pub const SUMMARY_INSTRUCTION: &str = "Summarize these collected reviews. The summarization should highlight both the positive and negative aspects of the place based on the review details:";

/// Header row matching [`ReviewRecord::row`]
pub const SPREADSHEET_COLUMNS: [&str; 5] = ["author", "rating", "date", "text", "owner_reply"];

impl ReviewRecord {
    /// One spreadsheet row; absent values become empty cells
    pub fn row(&self) -> [String; 5] {
        [
            self.author.clone(),
            self.rating.map(|r| r.to_string()).unwrap_or_default(),
            self.date.clone(),
            self.text.clone(),
            self.owner_reply.clone().unwrap_or_default(),
        ]
    }
}

/// Render the prompt text returned to the chat model
pub fn summary_prompt(result: &ScrapeResult) -> String {
    let mut out = String::from(SUMMARY_INSTRUCTION);
    out.push('\n');

    if result.reviews.is_empty() {
        out.push_str("No reviews were found for this place.");
    }

    for (i, review) in result.reviews.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        // Writing into a String cannot fail
        let _ = write!(
            out,
            "==REVIEW {}==\nReviewer: {}\nDate: {}\nRating: {}\nReview: {}",
            i + 1,
            review.author,
            review.date,
            review
                .rating
                .map(|r| r.to_string())
                .unwrap_or_else(|| "not rated".to_string()),
            review.text,
        );
        if let Some(reply) = &review.owner_reply {
            let _ = write!(out, "\nOwner reply: {reply}");
        }
    }

    if result.early_termination {
        let _ = write!(
            out,
            "\n\n(Collected {} reviews before stopping: {})",
            result.reviews.len(),
            stop_note(result.stop_reason)
        );
    }

    out
}

fn stop_note(reason: StopReason) -> &'static str {
    match reason {
        StopReason::TargetReached => "requested count reached",
        StopReason::Exhausted => "the place has no more reviews",
        StopReason::IterationCeiling => "iteration limit reached",
        StopReason::LoadTimeout => "the page stopped loading more reviews",
        StopReason::PipelineTimeout => "time limit reached",
        StopReason::BrowserFailure => "the browser stopped responding",
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    reviews: &'a [ReviewRecord],
    early_termination: bool,
    stop_reason: StopReason,
}

/// Machine-readable companion block of the tool response
pub fn json_payload(result: &ScrapeResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Payload {
        reviews: &result.reviews,
        early_termination: result.early_termination,
        stop_reason: result.stop_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn review(author: &str, rating: Option<u8>, reply: Option<&str>) -> ReviewRecord {
        ReviewRecord {
            identity: format!("id-{author}"),
            author: author.to_string(),
            rating,
            date: "2 weeks ago".to_string(),
            text: format!("{author} liked it"),
            owner_reply: reply.map(str::to_string),
        }
    }

    fn result(reviews: Vec<ReviewRecord>, stop_reason: StopReason) -> ScrapeResult {
        ScrapeResult {
            place_url: "https://maps.app.goo.gl/x".to_string(),
            reviews,
            early_termination: stop_reason.is_early(),
            stop_reason,
            iterations: 2,
            skipped: 0,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn row_matches_columns() {
        let row = review("Ana", Some(4), Some("Thanks!")).row();
        assert_eq!(row.len(), SPREADSHEET_COLUMNS.len());
        assert_eq!(row[0], "Ana");
        assert_eq!(row[1], "4");
        assert_eq!(row[4], "Thanks!");

        let bare = review("Bo", None, None).row();
        assert_eq!(bare[1], "");
        assert_eq!(bare[4], "");
    }

    #[test]
    fn prompt_numbers_reviews_from_one() {
        let text = summary_prompt(&result(
            vec![review("Ana", Some(5), None), review("Bo", None, Some("Sorry"))],
            StopReason::TargetReached,
        ));

        assert!(text.starts_with(SUMMARY_INSTRUCTION));
        assert!(text.contains("==REVIEW 1==\nReviewer: Ana\nDate: 2 weeks ago\nRating: 5\nReview: Ana liked it"));
        assert!(text.contains("==REVIEW 2==\nReviewer: Bo"));
        assert!(text.contains("Rating: not rated"));
        assert!(text.contains("Owner reply: Sorry"));
        assert!(!text.contains("==REVIEW 3=="));
        assert!(!text.contains("before stopping"));
    }

    #[test]
    fn prompt_flags_partial_results() {
        let text = summary_prompt(&result(vec![review("Ana", Some(3), None)], StopReason::Exhausted));
        assert!(text.ends_with("(Collected 1 reviews before stopping: the place has no more reviews)"));
    }

    #[test]
    fn empty_result_says_so() {
        let text = summary_prompt(&result(Vec::new(), StopReason::Exhausted));
        assert!(text.contains("No reviews were found"));
    }

    #[test]
    fn payload_carries_stop_reason() {
        let json = json_payload(&result(vec![review("Ana", Some(5), None)], StopReason::LoadTimeout)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["early_termination"], true);
        assert_eq!(value["stop_reason"], "load_timeout");
        assert_eq!(value["reviews"][0]["author"], "Ana");
        assert!(value["reviews"][0].get("owner_reply").is_none());
    }
}
