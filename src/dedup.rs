//! Duplicate detection across a growing result set.

use std::collections::HashSet;

use crate::models::Record;

/// True when `existing` already holds a record with the candidate's identity key.
///
/// Linear scan; callers that append in a loop should prefer [`DedupTracker`].
pub fn is_duplicate(candidate: &Record, existing: &[Record]) -> bool {
    let key = candidate.identity_key();
    existing.iter().any(|r| r.identity_key() == key)
}

/// Identity-key index kept in step with a result set.
///
/// Gives the same answers as [`is_duplicate`] against the records passed to
/// [`DedupTracker::insert`], without rescanning them.
#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: HashSet<String>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_duplicate(&self, candidate: &Record) -> bool {
        self.seen.contains(&candidate.identity_key())
    }

    /// Record the candidate's key; returns false if it was already known.
    pub fn insert(&mut self, record: &Record) -> bool {
        self.seen.insert(record.identity_key())
    }
}

/// Drop later records whose identity key was already seen, keeping order.
pub fn dedup_records(records: Vec<Record>) -> Vec<Record> {
    let mut tracker = DedupTracker::new();
    records.into_iter().filter(|r| tracker.insert(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_url_is_duplicate_regardless_of_other_fields() {
        let existing = vec![Record::from_pairs([("url", "u1"), ("price", "1")])];
        let candidate = Record::from_pairs([("url", "u1"), ("price", "999")]);
        assert!(is_duplicate(&candidate, &existing));
    }

    #[test]
    fn test_title_used_when_url_missing() {
        let existing = vec![Record::from_pairs([("title", "Same"), ("a", "1")])];
        let candidate = Record::from_pairs([("title", "Same"), ("a", "2")]);
        assert!(is_duplicate(&candidate, &existing));

        let other = Record::from_pairs([("title", "Different")]);
        assert!(!is_duplicate(&other, &existing));
    }

    #[test]
    fn test_full_record_fallback() {
        let existing = vec![Record::from_pairs([("price", "1")])];
        assert!(is_duplicate(&Record::from_pairs([("price", "1")]), &existing));
        assert!(!is_duplicate(&Record::from_pairs([("price", "2")]), &existing));
    }

    #[test]
    fn test_tracker_matches_linear_scan() {
        let records = vec![
            Record::from_pairs([("url", "a")]),
            Record::from_pairs([("title", "b")]),
            Record::from_pairs([("x", "c")]),
        ];
        let mut tracker = DedupTracker::new();
        for r in &records {
            assert!(tracker.insert(r));
        }
        let candidates = [
            Record::from_pairs([("url", "a"), ("title", "zzz")]),
            Record::from_pairs([("title", "b")]),
            Record::from_pairs([("x", "d")]),
        ];
        for candidate in &candidates {
            assert_eq!(tracker.is_duplicate(candidate), is_duplicate(candidate, &records));
        }
    }

    #[test]
    fn test_dedup_records_keeps_first() {
        let out = dedup_records(vec![
            Record::from_pairs([("url", "a"), ("n", "1")]),
            Record::from_pairs([("url", "b")]),
            Record::from_pairs([("url", "a"), ("n", "2")]),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("n"), Some("1"));
    }
}
