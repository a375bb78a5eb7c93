//! Order-preserving deduplication across loader batches
//!
//! The reviews list re-renders already shown cards as it grows, so the same
//! review shows up in many batches. Records are keyed by
//! [`ReviewRecord::identity`] and kept in first-seen order.

use std::collections::HashSet;

use crate::parser::ReviewRecord;

/// Running, duplicate-free review sequence
#[derive(Debug, Clone, Default)]
pub struct ReviewSet {
    records: Vec<ReviewRecord>,
    seen: HashSet<String>,
}

impl ReviewSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record` unless its identity is already present
    ///
    /// Returns `true` when the record was new.
    pub fn insert(&mut self, record: ReviewRecord) -> bool {
        if self.seen.contains(&record.identity) {
            return false;
        }
        self.seen.insert(record.identity.clone());
        self.records.push(record);
        true
    }

    /// Fold a batch in arrival order; returns how many records were new
    pub fn extend<I>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = ReviewRecord>,
    {
        candidates
            .into_iter()
            .map(|record| self.insert(record))
            .filter(|inserted| *inserted)
            .count()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.seen.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn as_slice(&self) -> &[ReviewRecord] {
        &self.records
    }

    /// Drop everything past the first `len` records
    pub fn truncate(&mut self, len: usize) {
        for dropped in self.records.drain(len.min(self.records.len())..) {
            self.seen.remove(&dropped.identity);
        }
    }

    pub fn into_vec(self) -> Vec<ReviewRecord> {
        self.records
    }
}

impl FromIterator<ReviewRecord> for ReviewSet {
    fn from_iter<I: IntoIterator<Item = ReviewRecord>>(iter: I) -> Self {
        let mut set = ReviewSet::new();
        set.extend(iter);
        set
    }
}

/// Fold `candidates` into `running`, discarding identities already present
///
/// Idempotent: folding the same batch twice leaves the result of the first
/// fold unchanged, and records already in `running` never move.
pub fn fold<I>(running: Vec<ReviewRecord>, candidates: I) -> Vec<ReviewRecord>
where
    I: IntoIterator<Item = ReviewRecord>,
{
    let mut set: ReviewSet = running.into_iter().collect();
    set.extend(candidates);
    set.into_vec()
}
