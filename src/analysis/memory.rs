use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use super::accessor::{HistoryAccessor, RevisionQuery};
use super::extract::parse_header;
use crate::error::{Result, StatsError};
use crate::types::CommitRecord;

#[derive(Debug, Default)]
struct Scripted {
    output: Option<String>,
    delay: Duration,
    failure: Option<String>,
    transient_failures: AtomicU32,
}

/// Deterministic in-memory accessor with scripted replies.
///
/// Commits are listed in insertion order on a single branch (`master` unless
/// changed with [`on_branch`](Self::on_branch)).
#[derive(Debug)]
pub struct MemoryAccessor {
    branch: String,
    order: Vec<String>,
    commits: HashMap<String, Scripted>,
    calls: AtomicUsize,
}

impl Default for MemoryAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccessor {
    pub fn new() -> Self {
        Self {
            branch: "master".to_string(),
            order: Vec::new(),
            commits: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    fn entry(&mut self, id: &str) -> &mut Scripted {
        if !self.commits.contains_key(id) {
            self.order.push(id.to_string());
        }
        self.commits.entry(id.to_string()).or_default()
    }

    /// Raw text returned by `show_commit(id)`.
    pub fn with_output(mut self, id: &str, output: impl Into<String>) -> Self {
        self.entry(id).output = Some(output.into());
        self
    }

    /// Script `record` in the accessor's wire shape.
    pub fn with_record(self, record: &CommitRecord) -> Self {
        let output = render_record(record);
        self.with_output(&record.id, output)
    }

    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.entry(id).delay = delay;
        self
    }

    /// Every call for `id` fails.
    pub fn with_failure(mut self, id: &str, reason: impl Into<String>) -> Self {
        self.entry(id).failure = Some(reason.into());
        self
    }

    /// The first `count` calls for `id` fail, later ones succeed.
    pub fn with_transient_failures(mut self, id: &str, count: u32) -> Self {
        self.entry(id).transient_failures = AtomicU32::new(count);
        self
    }

    /// Number of `show_commit` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }
}

/// Render a record the way `git show --numstat --format=%an#%ae#%as` would.
pub fn render_record(record: &CommitRecord) -> String {
    let mut out = format!(
        "{}#{}#{}\n",
        record.author_name,
        record.author_email,
        record.date.format("%Y-%m-%d")
    );
    if !record.deltas.is_empty() {
        out.push('\n');
    }
    for (i, delta) in record.deltas.iter().enumerate() {
        out.push_str(&format!("{}\t{}\tfile_{}\n", delta.added, delta.deleted, i));
    }
    out
}

#[async_trait]
impl HistoryAccessor for MemoryAccessor {
    async fn list_revisions(&self, query: &RevisionQuery) -> Result<Vec<String>> {
        if query.branch != self.branch {
            return Err(StatsError::Repository(format!("Branch '{}' does not exist", query.branch)));
        }

        let mut ids = Vec::new();
        for id in &self.order {
            if query.max_count.is_some_and(|limit| ids.len() >= limit) {
                break;
            }
            let header = self.commits[id]
                .output
                .as_deref()
                .and_then(|out| out.lines().next())
                .and_then(|line| parse_header(id, line).ok());
            if let Some((_, _, date)) = header {
                if !query.contains(date) {
                    continue;
                }
            }
            ids.push(id.clone());
        }
        Ok(ids)
    }

    async fn show_commit(&self, id: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .commits
            .get(id)
            .ok_or_else(|| StatsError::accessor(id, "unknown commit"))?;

        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        if let Some(reason) = &scripted.failure {
            return Err(StatsError::accessor(id, reason.clone()));
        }
        let pending = scripted
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(StatsError::accessor(id, "transient failure"));
        }

        scripted
            .output
            .clone()
            .ok_or_else(|| StatsError::accessor(id, "no output scripted"))
    }
}
