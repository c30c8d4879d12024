use super::*;
use crate::config::Config;
use crate::error::StatsError;
use crate::types::{AuthorKey, CollateBy, CommitRecord, LineDelta};
use chrono::{Duration as ChronoDuration, NaiveDate};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const AUTHORS: [(&str, &str); 4] = [
    ("Alice", "alice@x"),
    ("alice", "alice@x"),
    ("Bob", "bob@y"),
    ("Bob", "bob@z"),
];

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn record(id: &str, author: usize, date: NaiveDate, deltas: &[(u64, u64)]) -> CommitRecord {
    let (name, email) = AUTHORS[author % AUTHORS.len()];
    CommitRecord {
        id: id.to_string(),
        author_name: name.to_string(),
        author_email: email.to_string(),
        date,
        deltas: deltas
            .iter()
            .map(|&(added, deleted)| LineDelta { added, deleted })
            .collect(),
    }
}

fn synthetic(count: usize) -> Vec<CommitRecord> {
    (0..count)
        .map(|i| {
            let date = day("2020-01-01") + ChronoDuration::days((i * 7 % 365) as i64);
            record(&format!("c{i:04}"), i, date, &[((i % 13) as u64, (i % 5) as u64), (1, 0)])
        })
        .collect()
}

fn accessor_for(records: &[CommitRecord]) -> MemoryAccessor {
    records
        .iter()
        .fold(MemoryAccessor::new(), |acc, r| acc.with_record(r))
}

fn ids(records: &[CommitRecord]) -> Vec<String> {
    records.iter().map(|r| r.id.clone()).collect()
}

fn sequential(records: &[CommitRecord], aliases: &AliasMap, collate_by: CollateBy) -> Ledger {
    let mut ledger = Ledger::new();
    for r in records {
        let name = aliases.resolve(&r.author_name, &r.author_email);
        ledger.merge(collate_by.key(name, &r.author_email), name, r);
    }
    ledger
}

async fn aggregate(
    accessor: MemoryAccessor,
    ids: Vec<String>,
    workers: usize,
    collate_by: CollateBy,
) -> Ledger {
    Aggregator::new(Arc::new(accessor))
        .with_workers(workers)
        .with_collate_by(collate_by)
        .run(ids, CancellationToken::new(), None)
        .await
        .unwrap()
        .completed()
        .unwrap()
}

#[tokio::test]
async fn test_alias_merge_scenario() {
    let c1 = CommitRecord {
        id: "c1".into(),
        author_name: "Alice".into(),
        author_email: "alice@x".into(),
        date: day("2024-01-01"),
        deltas: vec![LineDelta { added: 10, deleted: 0 }],
    };
    let c2 = CommitRecord {
        id: "c2".into(),
        author_name: "Alice".into(),
        author_email: "alice@y".into(),
        date: day("2024-01-02"),
        deltas: vec![LineDelta { added: 0, deleted: 5 }],
    };
    let mut aliases = AliasMap::new();
    aliases.insert("alice@y", "Alice");

    let outcome = Aggregator::new(Arc::new(MemoryAccessor::new().with_record(&c1).with_record(&c2)))
        .with_workers(2)
        .with_aliases(aliases)
        .with_collate_by(CollateBy::Name)
        .run(vec!["c1".into(), "c2".into()], CancellationToken::new(), None)
        .await
        .unwrap();

    let ledger = outcome.completed().unwrap();
    assert_eq!(ledger.len(), 1);
    let alice = ledger.get(&AuthorKey::Name("Alice".into())).unwrap();
    assert_eq!(alice.name, "Alice");
    assert_eq!(alice.commits, 2);
    assert_eq!(alice.added, 10);
    assert_eq!(alice.deleted, 5);
    assert_eq!(alice.first_date, day("2024-01-01"));
    assert_eq!(alice.last_date, day("2024-01-02"));
}

#[tokio::test]
async fn test_malformed_commit_fails_whole_run() {
    let records = synthetic(20);
    let accessor =
        accessor_for(&records).with_output("broken", "Alice alice@x 2024-01-01\n1\t1\tf");
    let mut all_ids = ids(&records);
    all_ids.insert(10, "broken".into());

    let aggregator = Aggregator::new(Arc::new(accessor)).with_workers(4);
    let state = aggregator.subscribe();
    let result = aggregator.run(all_ids, CancellationToken::new(), None).await;

    assert!(matches!(result, Err(StatsError::MalformedCommit { ref id, .. }) if id == "broken"));
    assert_eq!(*state.borrow(), EngineState::Failed);
}

#[tokio::test]
async fn test_accessor_failure_aborts_and_stops_dispatch() {
    let records = synthetic(200);
    let accessor = Arc::new(accessor_for(&records).with_failure("c0000", "git exploded"));

    let result = Aggregator::new(accessor.clone())
        .with_workers(1)
        .run(ids(&records), CancellationToken::new(), None)
        .await;

    assert!(matches!(result, Err(StatsError::Accessor { .. })));
    // The single worker stops at the first failure
    assert_eq!(accessor.calls(), 1);
}

#[tokio::test]
async fn test_timeout_aborts_run() {
    let records = synthetic(3);
    let accessor = accessor_for(&records).with_delay("c0001", Duration::from_secs(10));

    let result = Aggregator::new(Arc::new(accessor))
        .with_workers(3)
        .with_policy(ExtractPolicy {
            timeout: Duration::from_millis(50),
            ..ExtractPolicy::default()
        })
        .run(ids(&records), CancellationToken::new(), None)
        .await;

    assert!(matches!(result, Err(StatsError::Accessor { ref id, .. }) if id == "c0001"));
}

#[tokio::test]
async fn test_binary_files_count_commit_only() {
    let accessor = MemoryAccessor::new()
        .with_output("c1", "Carol#carol@w#2024-05-01\n\n-\t-\tlogo.png\n4\t1\tsrc/main.rs\n")
        .with_output("c2", "Carol#carol@w#2024-05-02\n\n-\t-\tbanner.jpg\n");

    let ledger = aggregate(accessor, vec!["c1".into(), "c2".into()], 2, CollateBy::Email).await;
    let carol = ledger.get(&AuthorKey::Email("carol@w".into())).unwrap();
    assert_eq!(carol.commits, 2);
    assert_eq!(carol.added, 4);
    assert_eq!(carol.deleted, 1);
}

#[tokio::test]
async fn test_concurrency_stress_matches_sequential() {
    let records = synthetic(1000);

    let parallel =
        aggregate(accessor_for(&records), ids(&records), 8, CollateBy::NameAndEmail).await;
    let single = aggregate(accessor_for(&records), ids(&records), 1, CollateBy::NameAndEmail).await;

    assert_eq!(parallel, single);
    assert_eq!(parallel.total_commits(), 1000);
    assert_eq!(parallel, sequential(&records, &AliasMap::new(), CollateBy::NameAndEmail));
}

#[tokio::test]
async fn test_conservation() {
    let records = synthetic(150);
    let ledger = aggregate(accessor_for(&records), ids(&records), 6, CollateBy::NameAndEmail).await;

    assert_eq!(ledger.total_commits(), 150);
    assert_eq!(ledger.total_added(), records.iter().map(CommitRecord::added).sum::<u64>());
    assert_eq!(ledger.total_deleted(), records.iter().map(CommitRecord::deleted).sum::<u64>());

    for (i, (name, email)) in AUTHORS.iter().enumerate() {
        let own: Vec<_> = records
            .iter()
            .filter(|r| r.author_name == *name && r.author_email == *email)
            .collect();
        let stats = ledger
            .get(&AuthorKey::NameAndEmail(name.to_string(), email.to_string()))
            .unwrap_or_else(|| panic!("author {i} missing"));
        assert_eq!(stats.commits, own.len() as u64);
        assert_eq!(stats.added, own.iter().map(|r| r.added()).sum::<u64>());
        assert_eq!(stats.deleted, own.iter().map(|r| r.deleted()).sum::<u64>());
    }
}

#[tokio::test]
async fn test_collation_equivalence() {
    let records = synthetic(120);
    let mut totals = Vec::new();
    let mut groups = Vec::new();
    for collate_by in [CollateBy::Name, CollateBy::Email, CollateBy::NameAndEmail] {
        let ledger = aggregate(accessor_for(&records), ids(&records), 4, collate_by).await;
        totals.push((ledger.total_commits(), ledger.total_added(), ledger.total_deleted()));
        groups.push(ledger.len());
    }

    assert!(totals.windows(2).all(|w| w[0] == w[1]));
    // Alice/alice share an email, Bob has two
    assert_eq!(groups, vec![3, 3, 4]);
}

#[tokio::test]
async fn test_cancel_before_start() {
    let records = synthetic(10);
    let accessor = Arc::new(accessor_for(&records));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = Aggregator::new(accessor.clone())
        .with_workers(4)
        .run(ids(&records), cancel, None)
        .await
        .unwrap();

    match outcome {
        AggregationOutcome::Cancelled { ledger, merged, total } => {
            assert!(ledger.is_empty());
            assert_eq!(merged, 0);
            assert_eq!(total, 10);
        }
        AggregationOutcome::Completed(_) => panic!("cancelled run reported as complete"),
    }
    assert_eq!(accessor.calls(), 0);
}

#[tokio::test]
async fn test_cancel_mid_run_keeps_only_whole_records() {
    let records = synthetic(40);
    let accessor = ids(&records)
        .iter()
        .fold(accessor_for(&records), |acc, id| acc.with_delay(id, Duration::from_millis(20)));
    let cancel = CancellationToken::new();

    let aggregator = Aggregator::new(Arc::new(accessor)).with_workers(2);
    let state = aggregator.subscribe();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(90)).await;
        trigger.cancel();
    });

    let outcome = aggregator.run(ids(&records), cancel, None).await.unwrap();
    let AggregationOutcome::Cancelled { ledger, merged, total } = outcome else {
        panic!("expected a cancelled run");
    };

    assert!(merged > 0 && merged < total);
    assert_eq!(ledger.total_commits(), merged as u64);
    for stats in ledger.values() {
        assert!(stats.first_date <= stats.last_date);
        // Every synthetic commit adds at least one line, so a torn merge would show up here
        assert!(stats.added >= stats.commits);
    }
    assert_eq!(*state.borrow(), EngineState::Cancelled);
}

#[tokio::test]
async fn test_state_and_progress() {
    let records = synthetic(64);
    let aggregator = Aggregator::new(Arc::new(accessor_for(&records))).with_workers(4);
    assert_eq!(aggregator.state(), EngineState::Idle);
    let state = aggregator.subscribe();

    let (handle, reporter) = ProgressReporter::hidden(64);
    let outcome = aggregator
        .run(ids(&records), CancellationToken::new(), Some(handle))
        .await
        .unwrap();

    assert!(outcome.is_completed());
    assert_eq!(*state.borrow(), EngineState::Completed);
    assert_eq!(reporter.finish().await, 64);
}

#[tokio::test]
async fn test_empty_input() {
    let ledger = aggregate(MemoryAccessor::new(), Vec::new(), 4, CollateBy::Name).await;
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_configured_retries_recover_transient_failures() {
    let records = synthetic(40);
    let flaky = || {
        records
            .iter()
            .step_by(5)
            .fold(accessor_for(&records), |acc, r| acc.with_transient_failures(&r.id, 2))
    };
    let config = Config {
        workers: Some(4),
        retries: 2,
        retry_backoff_ms: 1,
        ..Config::default()
    };

    let accessor = Arc::new(flaky());
    let outcome = Aggregator::from_config(accessor.clone(), &config, AliasMap::new())
        .run(ids(&records), CancellationToken::new(), None)
        .await
        .unwrap();

    let expected = sequential(&records, &AliasMap::new(), CollateBy::NameAndEmail);
    assert_eq!(outcome.completed().unwrap(), expected);
    // 8 flaky commits, each failing twice before succeeding
    assert_eq!(accessor.calls(), 40 + 8 * 2);

    // Without retries the first transient failure aborts the run
    let strict = Config {
        retries: 0,
        ..config
    };
    let result = Aggregator::from_config(Arc::new(flaky()), &strict, AliasMap::new())
        .run(ids(&records), CancellationToken::new(), None)
        .await;
    assert!(matches!(result, Err(StatsError::Accessor { .. })));
}

fn arb_commits() -> impl Strategy<Value = Vec<(usize, i64, Vec<(u64, u64)>, u64)>> {
    prop::collection::vec(
        (
            0..AUTHORS.len(),
            0i64..60,
            prop::collection::vec((0u64..200, 0u64..200), 0..4),
            0u64..4,
        ),
        1..40,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_order_independent(commits in arb_commits(), workers in 1usize..8) {
        let records: Vec<CommitRecord> = commits
            .iter()
            .enumerate()
            .map(|(i, (author, offset, deltas, _))| {
                let date = day("2024-01-01") + ChronoDuration::days(*offset);
                record(&format!("p{i}"), *author, date, deltas)
            })
            .collect();
        // Scripted delays shuffle completion order relative to dispatch order
        let accessor = records
            .iter()
            .zip(&commits)
            .fold(accessor_for(&records), |acc, (r, c)| {
                acc.with_delay(&r.id, Duration::from_millis(c.3))
            });

        let mut aliases = AliasMap::new();
        aliases.insert("bob@z", "Bob");
        let expected = sequential(&records, &aliases, CollateBy::Name);

        let ledger = tokio_test::block_on(async {
            Aggregator::new(Arc::new(accessor))
                .with_workers(workers)
                .with_aliases(aliases.clone())
                .with_collate_by(CollateBy::Name)
                .run(ids(&records), CancellationToken::new(), None)
                .await
        })
        .unwrap()
        .completed()
        .unwrap();

        prop_assert_eq!(&ledger, &expected);
        prop_assert_eq!(format!("{:?}", ledger), format!("{:?}", expected));
        for stats in ledger.values() {
            prop_assert!(stats.first_date <= stats.last_date);
        }
    }

    #[test]
    fn prop_merge_order_permutation(commits in arb_commits(), seed in any::<u64>()) {
        use rand::{seq::SliceRandom, SeedableRng};

        let records: Vec<CommitRecord> = commits
            .iter()
            .enumerate()
            .map(|(i, (author, offset, deltas, _))| {
                let date = day("2023-06-01") + ChronoDuration::days(*offset);
                record(&format!("q{i}"), *author, date, deltas)
            })
            .collect();
        let mut shuffled = records.clone();
        shuffled.shuffle(&mut rand::rngs::StdRng::seed_from_u64(seed));

        for collate_by in [CollateBy::Name, CollateBy::Email, CollateBy::NameAndEmail] {
            prop_assert_eq!(
                sequential(&records, &AliasMap::new(), collate_by),
                sequential(&shuffled, &AliasMap::new(), collate_by)
            );
        }
    }
}
