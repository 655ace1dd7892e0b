//! Lifecycle tests: phase ordering, commit without rollback, and teardown.

use plexstore_core::{CoreError, DataStoreTransaction};
use plexstore_multiplex::{MultiplexConfig, MultiplexManager, TransactionState};
use plexstore_testkit::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

fn three_stores(log: &CallLog, faulty: Option<(&'static str, Fault)>) -> MultiplexManager {
    init_tracing();
    let store = |name: &'static str, class: &str| {
        let store = RecordingStore::new(name, log).owning(class);
        match faulty {
            Some((target, fault)) if target == name => store.failing(fault),
            _ => store,
        }
    };
    MultiplexManager::builder()
        .store(Arc::new(store("s1", "author")))
        .store(Arc::new(store("s2", "book")))
        .store(Arc::new(store("s3", "publisher")))
        .build()
        .unwrap()
}

fn lifecycle_calls(log: &CallLog) -> Vec<(&'static str, &'static str)> {
    log.names()
        .into_iter()
        .filter(|(_, name)| !name.starts_with("begin"))
        .collect()
}

#[test]
fn begin_opens_stores_in_registration_order() {
    let log = CallLog::new();
    let txn = three_stores(&log, None).begin().unwrap();

    assert_eq!(txn.len(), 3);
    assert_eq!(log.names(), [("s1", "begin"), ("s2", "begin"), ("s3", "begin")]);
}

#[test]
fn commit_flushes_every_store_before_committing_any() {
    let log = CallLog::new();
    let mut txn = three_stores(&log, None).begin().unwrap();

    txn.commit().unwrap();

    assert_eq!(
        lifecycle_calls(&log),
        [
            ("s1", "flush"),
            ("s2", "flush"),
            ("s3", "flush"),
            ("s1", "commit"),
            ("s2", "commit"),
            ("s3", "commit"),
        ]
    );
    assert_eq!(txn.state(), TransactionState::Committed);
}

#[test]
fn explicit_phases_run_in_order() {
    let log = CallLog::new();
    let mut txn = three_stores(&log, None).begin().unwrap();

    txn.flush().unwrap();
    assert_eq!(txn.state(), TransactionState::Flushed);
    txn.pre_commit().unwrap();
    assert_eq!(txn.state(), TransactionState::PreCommitted);
    txn.commit().unwrap();
    txn.close().unwrap();

    let names: Vec<_> = lifecycle_calls(&log).into_iter().map(|(_, n)| n).collect();
    assert_eq!(
        names,
        [
            "flush", "flush", "flush", "pre-commit", "pre-commit", "pre-commit", "flush",
            "flush", "flush", "commit", "commit", "commit", "close", "close", "close",
        ]
    );
}

#[test]
fn flush_failure_stops_before_any_commit() {
    let log = CallLog::new();
    let mut txn = three_stores(&log, Some(("s2", Fault::Flush))).begin().unwrap();

    let err = txn.commit().unwrap_err();
    assert!(matches!(err, CoreError::Store { ref message } if message.contains("s2")));
    assert_eq!(lifecycle_calls(&log), [("s1", "flush"), ("s2", "flush")]);
    assert_eq!(log.count("commit"), 0);
    assert_eq!(txn.state(), TransactionState::Open);
}

#[test]
fn pre_commit_fails_fast() {
    let log = CallLog::new();
    let mut txn = three_stores(&log, Some(("s1", Fault::PreCommit))).begin().unwrap();

    assert!(txn.pre_commit().is_err());
    assert_eq!(lifecycle_calls(&log), [("s1", "pre-commit")]);
}

#[test]
fn commit_failure_does_not_roll_back_earlier_stores() {
    let log = CallLog::new();
    let mut txn = three_stores(&log, Some(("s2", Fault::Commit))).begin().unwrap();

    let err = txn.commit().unwrap_err();
    assert_eq!(err.to_string(), "store error: s2: injected commit failure");
    assert_eq!(log.names_for("s1"), ["begin", "flush", "commit"]);
    assert_eq!(log.names_for("s3"), ["begin", "flush"]);
    assert_ne!(txn.state(), TransactionState::Committed);

    txn.close().unwrap();
    // close is the only thing that follows; s1 stays committed
    assert_eq!(log.names_for("s1"), ["begin", "flush", "commit", "close"]);
}

#[test]
fn close_attempts_every_store_and_aggregates_failures() {
    let log = CallLog::new();
    let mut txn = three_stores(&log, Some(("s2", Fault::Close))).begin().unwrap();

    let err = txn.close().unwrap_err();

    assert_eq!(lifecycle_calls(&log), [("s1", "close"), ("s2", "close"), ("s3", "close")]);
    let CoreError::Close(failure) = err else {
        panic!("expected aggregated close failure");
    };
    let causes: Vec<_> = failure.causes().map(ToString::to_string).collect();
    assert_eq!(causes, ["store error: s2: injected close failure"]);
    assert!(failure.suppressed().is_empty());
    assert!(txn.is_empty());
    assert_eq!(txn.state(), TransactionState::Closed);
}

#[test]
fn later_close_failures_are_suppressed_in_order() {
    init_tracing();
    let log = CallLog::new();
    let manager = MultiplexManager::builder()
        .store(Arc::new(
            RecordingStore::new("s1", &log)
                .owning("author")
                .failing(Fault::Close),
        ))
        .store(Arc::new(RecordingStore::new("s2", &log).owning("book")))
        .store(Arc::new(
            RecordingStore::new("s3", &log)
                .owning("publisher")
                .failing(Fault::Close),
        ))
        .build()
        .unwrap();
    let mut txn = manager.begin().unwrap();

    let Err(CoreError::Close(failure)) = txn.close() else {
        panic!("expected aggregated close failure");
    };
    assert!(failure.primary().to_string().contains("s1"));
    assert_eq!(failure.suppressed().len(), 1);
    assert!(failure.suppressed()[0].to_string().contains("s3"));
    assert_eq!(failure.len(), 2);
    assert!(failure.to_string().ends_with("(1 suppressed)"));
}

#[test]
fn dropping_unclosed_transaction_closes_every_store() {
    let log = CallLog::new();
    let manager = three_stores(&log, Some(("s1", Fault::Close)));
    {
        let mut txn = manager.begin().unwrap();
        txn.flush().unwrap();
    }
    assert_eq!(log.count("close"), 3);
}

#[test]
fn panicking_close_is_not_retried_on_drop() {
    init_tracing();
    let log = CallLog::new();
    let manager = MultiplexManager::builder()
        .store(Arc::new(RecordingStore::new("s1", &log).owning("author")))
        .store(Arc::new(
            RecordingStore::new("s2", &log)
                .owning("book")
                .panicking(Fault::Close),
        ))
        .store(Arc::new(RecordingStore::new("s3", &log).owning("publisher")))
        .build()
        .unwrap();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut txn = manager.begin().unwrap();
        txn.close()
    }));

    assert!(outcome.is_err());
    assert_eq!(log.names_for("s1"), ["begin", "close"]);
    assert_eq!(log.names_for("s2"), ["begin", "close"]);
    // released by the unwind, never closed
    assert_eq!(log.names_for("s3"), ["begin"]);
}

#[test]
fn drop_does_not_close_when_disabled() {
    init_tracing();
    let log = CallLog::new();
    let manager = MultiplexManager::builder()
        .config(MultiplexConfig::new().close_on_drop(false))
        .store(Arc::new(RecordingStore::new("s1", &log).owning("author")))
        .build()
        .unwrap();

    drop(manager.begin().unwrap());
    assert_eq!(log.count("close"), 0);
}

#[test]
fn begin_failure_closes_already_opened_stores() {
    let log = CallLog::new();
    let manager = three_stores(&log, Some(("s2", Fault::Begin)));

    let err = manager.begin().unwrap_err();
    assert_eq!(err.to_string(), "store error: s2: injected begin failure");
    assert_eq!(log.names(), [("s1", "begin"), ("s2", "begin"), ("s1", "close")]);
}

#[test]
fn closed_transaction_rejects_everything_but_close() {
    let log = CallLog::new();
    let mut txn = three_stores(&log, None).begin().unwrap();
    txn.close().unwrap();

    assert!(matches!(txn.flush(), Err(CoreError::TransactionClosed)));
    assert!(matches!(txn.pre_commit(), Err(CoreError::TransactionClosed)));
    assert!(matches!(txn.save(&author("1", "x")), Err(CoreError::TransactionClosed)));
    assert!(txn.close().is_ok());
    assert_eq!(log.count("close"), 3);
}
