pub mod accessor;
pub mod collate;
pub mod engine;
pub mod extract;
pub mod ledger;
pub mod memory;
pub mod progress;

#[cfg(test)]
mod tests;

pub use accessor::{GitAccessor, HistoryAccessor, RevisionQuery};
pub use collate::AliasMap;
pub use engine::{AggregationOutcome, Aggregator, EngineState};
pub use extract::{extract_commit, parse_record, ExtractPolicy};
pub use ledger::Ledger;
pub use memory::{render_record, MemoryAccessor};
pub use progress::{ProgressHandle, ProgressReporter};
