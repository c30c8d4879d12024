use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::report::SortBy;
use crate::types::{AuthorKey, AuthorStats, CommitRecord};

/// Per-author statistics accumulated over one run.
///
/// The ledger has no internal locking; the aggregation engine is its only
/// writer and serializes access. Keys are ordered, so iteration (and
/// therefore any output built from it) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    authors: BTreeMap<AuthorKey, AuthorStats>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats for `key`, created from the seed identity on first sighting.
    pub fn add_or_get(
        &mut self,
        key: AuthorKey,
        name: &str,
        email: &str,
        date: NaiveDate,
    ) -> &mut AuthorStats {
        self.authors
            .entry(key)
            .or_insert_with(|| AuthorStats::new(name, email, date))
    }

    /// Fold one record into the stats of `key`. `name` is the alias-resolved name.
    pub fn merge(&mut self, key: AuthorKey, name: &str, record: &CommitRecord) {
        self.add_or_get(key, name, &record.author_email, record.date)
            .absorb(name, record);
    }

    pub fn get(&self, key: &AuthorKey) -> Option<&AuthorStats> {
        self.authors.get(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &AuthorStats> {
        self.authors.values()
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    pub fn total_commits(&self) -> u64 {
        self.values().map(|a| a.commits).sum()
    }

    pub fn total_added(&self) -> u64 {
        self.values().map(|a| a.added).sum()
    }

    pub fn total_deleted(&self) -> u64 {
        self.values().map(|a| a.deleted).sum()
    }

    pub fn total_edits(&self) -> u64 {
        self.values().map(AuthorStats::edits).sum()
    }

    /// Report order: descending by the sort column, ties in key order.
    pub fn into_sorted(self, sort_by: SortBy) -> Vec<AuthorStats> {
        let mut authors: Vec<AuthorStats> = self.authors.into_values().collect();
        match sort_by {
            SortBy::Edits => authors.sort_by(|a, b| b.edits().cmp(&a.edits())),
            SortBy::Commits => authors.sort_by(|a, b| b.commits.cmp(&a.commits)),
        }
        authors
    }
}
