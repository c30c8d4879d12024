//! # Common Types
//!
//! This module contains the common types used throughout the crate for
//! representing extracted commits and the per-author statistics they are
//! folded into.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Added/deleted line counts for one non-binary file of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineDelta {
    pub added: u64,
    pub deleted: u64,
}

/// One parsed commit, as produced by the extractor.
///
/// Records only live between extraction and the ledger merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Commit identifier as handed out by the revision lister
    pub id: String,
    /// Raw author name, before alias resolution
    pub author_name: String,
    /// Raw author email
    pub author_email: String,
    /// Commit date, day granularity
    pub date: NaiveDate,
    /// Per-file line deltas in accessor order; binary files have no entry
    pub deltas: Vec<LineDelta>,
}

impl CommitRecord {
    /// Total lines added across all files.
    pub fn added(&self) -> u64 {
        self.deltas.iter().map(|d| d.added).sum()
    }

    /// Total lines deleted across all files.
    pub fn deleted(&self) -> u64 {
        self.deltas.iter().map(|d| d.deleted).sum()
    }
}

/// The rule deciding which fields identify a distinct author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CollateBy {
    Name,
    Email,
    /// Name and email together
    #[default]
    #[serde(rename = "both")]
    #[value(name = "both")]
    NameAndEmail,
}

/// Grouping key of the ledger, shaped by the [`CollateBy`] policy in effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthorKey {
    Name(String),
    Email(String),
    NameAndEmail(String, String),
}

/// Accumulated statistics for one author key.
///
/// Invariants: `first_date <= last_date`, `commits` counts merged records,
/// `added` and `deleted` only ever grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorStats {
    /// Display name, alias-resolved
    pub name: String,
    pub email: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub commits: u64,
    pub added: u64,
    pub deleted: u64,
}

impl AuthorStats {
    /// Fresh entry for a key seen for the first time. Counters start at zero;
    /// the first [`absorb`](Self::absorb) brings `commits` to one.
    pub fn new(name: &str, email: &str, date: NaiveDate) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            first_date: date,
            last_date: date,
            commits: 0,
            added: 0,
            deleted: 0,
        }
    }

    /// Fold one commit into this entry.
    ///
    /// `name` is the alias-resolved display name of the record. The shown
    /// identity follows the most recent commit, ties broken by the greater
    /// `(name, email)`, which keeps the result independent of merge order.
    pub fn absorb(&mut self, name: &str, record: &CommitRecord) {
        let incoming = (record.date, name, record.author_email.as_str());
        let current = (self.last_date, self.name.as_str(), self.email.as_str());
        if incoming > current {
            self.name = name.to_string();
            self.email = record.author_email.clone();
        }

        self.first_date = self.first_date.min(record.date);
        self.last_date = self.last_date.max(record.date);
        self.commits += 1;
        self.added += record.added();
        self.deleted += record.deleted();
    }

    /// Lines added plus lines deleted.
    pub fn edits(&self) -> u64 {
        self.added + self.deleted
    }
}
