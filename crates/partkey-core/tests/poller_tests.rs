//! Confirmation polling against a scripted ledger.

use std::time::Duration;

use partkey_core::{
    ConfirmationPoller, LifecycleError, LedgerClient, PendingTransactionStatus, Round, TxId,
};
use partkey_testkit::{ScriptedLedger, init_test_tracing};

fn tx() -> TxId {
    TxId::new("TX1")
}

#[tokio::test]
async fn test_pending_twice_then_confirmed() {
    init_test_tracing();
    let ledger = ScriptedLedger::at_round(100);
    ledger.script_statuses([
        PendingTransactionStatus::pending(),
        PendingTransactionStatus::pending(),
        PendingTransactionStatus::confirmed(500),
    ]);

    let round = ConfirmationPoller::new(&ledger)
        .wait_for_confirmation(&tx(), Round(100))
        .await
        .unwrap();

    assert_eq!(round, Round(500));
    assert_eq!(ledger.queried(), vec![tx(), tx(), tx()]);
    assert_eq!(ledger.waited_rounds(), vec![Round(101), Round(102)]);
}

#[tokio::test]
async fn test_confirmed_immediately_never_waits() {
    let ledger = ScriptedLedger::at_round(100);
    ledger.script_statuses([PendingTransactionStatus::confirmed(101)]);

    let round = ConfirmationPoller::new(&ledger)
        .wait_for_confirmation(&tx(), Round(100))
        .await
        .unwrap();

    assert_eq!(round, Round(101));
    assert_eq!(ledger.wait_count(), 0);
}

#[tokio::test]
async fn test_pool_rejection_is_terminal() {
    let ledger = ScriptedLedger::at_round(100);
    ledger.script_statuses([
        PendingTransactionStatus::pending(),
        PendingTransactionStatus::rejected("overspend"),
        PendingTransactionStatus::confirmed(900),
    ]);

    let err = ConfirmationPoller::new(&ledger)
        .wait_for_confirmation(&tx(), Round(100))
        .await
        .unwrap_err();

    match err {
        LifecycleError::PoolRejected { tx_id, reason } => {
            assert_eq!(tx_id, tx());
            assert_eq!(reason, "overspend");
        }
        other => panic!("expected PoolRejected, got {other:?}"),
    }
    assert_eq!(ledger.query_count(), 2);
    assert_eq!(ledger.wait_count(), 1);
}

#[tokio::test]
async fn test_query_failure_is_not_retried() {
    let ledger = ScriptedLedger::at_round(100);
    ledger.fail_next_queries(1);

    let err = ConfirmationPoller::new(&ledger)
        .wait_for_confirmation(&tx(), Round(100))
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::QueryFailed(_)));
    assert_eq!(ledger.query_count(), 1);
}

#[tokio::test]
async fn test_wait_failure_surfaces_as_query_failure() {
    let ledger = ScriptedLedger::at_round(100);
    ledger.script_statuses([PendingTransactionStatus::pending()]);
    ledger.fail_waits();

    let err = ConfirmationPoller::new(&ledger)
        .wait_for_confirmation(&tx(), Round(100))
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::QueryFailed(_)));
}

#[tokio::test]
async fn test_poll_follows_ledger_when_it_jumps_ahead() {
    let ledger = ScriptedLedger::at_round(100);
    ledger.script_statuses([
        PendingTransactionStatus::pending(),
        PendingTransactionStatus::pending(),
    ]);

    // Waiting for 101 lands the node at 150; the next wait targets 151.
    ledger.set_round(150);
    let round = ConfirmationPoller::new(&ledger)
        .wait_for_confirmation(&tx(), Round(100))
        .await
        .unwrap();

    assert_eq!(ledger.waited_rounds(), vec![Round(101), Round(151)]);
    assert_eq!(round, Round(152));
    assert_eq!(ledger.status().await.unwrap().last_round, Round(151));
}

#[tokio::test]
async fn test_timeout_cancels_unbounded_wait() {
    let ledger = ScriptedLedger::at_round(100);
    ledger.script_statuses([PendingTransactionStatus::pending()]);
    ledger.hang_waits();

    let poller = ConfirmationPoller::new(&ledger);
    let result = tokio::time::timeout(
        Duration::from_millis(50),
        poller.wait_for_confirmation(&tx(), Round(100)),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(ledger.query_count(), 1);
}
