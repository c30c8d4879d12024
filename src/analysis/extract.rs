//! Commit extraction: one accessor call, one parsed [`CommitRecord`].

use chrono::NaiveDate;
use rand::Rng;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use super::accessor::HistoryAccessor;
use crate::error::{Result, StatsError};
use crate::types::{CommitRecord, LineDelta};

/// How long and how often extraction may try one commit.
#[derive(Debug, Clone, Copy)]
pub struct ExtractPolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for ExtractPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 0,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Split a `name#email#date` header. The name is everything before the
/// second-to-last `#`, so names may contain `#` themselves.
pub fn parse_header(id: &str, line: &str) -> Result<(String, String, NaiveDate)> {
    let mut fields = line.trim_end().rsplitn(3, '#');
    let date = fields.next().unwrap_or_default();
    let (email, name) = match (fields.next(), fields.next()) {
        (Some(email), Some(name)) => (email, name),
        _ => {
            let reason = format!("author line without name#email#date: [{line}]");
            return Err(StatsError::malformed(id, reason));
        }
    };
    if name.is_empty() {
        return Err(StatsError::malformed(id, format!("empty author name: [{line}]")));
    }
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| StatsError::malformed(id, format!("bad date '{date}': {e}")))?;

    Ok((name.to_string(), email.to_string(), date))
}

/// `<added>\t<deleted>\t<path>`; anything else (binary `-\t-`, blanks) yields `None`.
fn parse_numstat(line: &str) -> Option<LineDelta> {
    let mut parts = line.split('\t');
    let added = parts.next()?.trim().parse().ok()?;
    let deleted = parts.next()?.trim().parse().ok()?;
    Some(LineDelta { added, deleted })
}

/// Parse the raw accessor output for commit `id`.
pub fn parse_record(id: &str, raw: &str) -> Result<CommitRecord> {
    let mut lines = raw.lines();
    let header = lines
        .next()
        .ok_or_else(|| StatsError::malformed(id, "empty accessor output"))?;
    let (author_name, author_email, date) = parse_header(id, header)?;
    let deltas = lines.filter_map(parse_numstat).collect();

    Ok(CommitRecord {
        id: id.to_string(),
        author_name,
        author_email,
        date,
        deltas,
    })
}

async fn attempt(accessor: &dyn HistoryAccessor, id: &str, limit: Duration) -> Result<String> {
    match timeout(limit, accessor.show_commit(id)).await {
        Ok(result) => result,
        Err(_) => Err(StatsError::accessor(id, format!("timed out after {limit:?}"))),
    }
}

/// Fetch and parse one commit.
///
/// Accessor failures are retried up to `policy.retries` times with
/// exponential backoff and jitter; malformed output never is.
pub async fn extract_commit(
    accessor: &dyn HistoryAccessor,
    id: &str,
    policy: &ExtractPolicy,
) -> Result<CommitRecord> {
    let mut tries = 0;
    loop {
        match attempt(accessor, id, policy.timeout).await {
            Ok(raw) => return parse_record(id, &raw),
            Err(e) if e.is_transient() && tries < policy.retries => {
                let base = policy.backoff.saturating_mul(1 << tries.min(16));
                let jitter = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
                let delay = base + Duration::from_millis(jitter);
                warn!("Retrying commit {} in {:?}: {}", id, delay, e);
                tokio::time::sleep(delay).await;
                tries += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
