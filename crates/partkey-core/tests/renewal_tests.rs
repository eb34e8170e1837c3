//! Single-account lifecycle: renewal, status changes, credential management.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use partkey_core::{
    CredentialDestination, DispatchOutcome, EngineConfig, LifecycleEngine, LifecycleError,
    MultisigInfo, PendingTransactionStatus, RenewalRequest, Round, SignedTransactionEnvelope,
    StatusChangeRequest, StatusIntent, WaitMode, WindowTooShort, default_key_dilution,
};
use partkey_testkit::{
    EngineHarness, ScriptedLedger, assert_confirmed_at, assert_err, assert_ok, fixtures,
    init_test_tracing,
};

/// Ledger at round 1000 with a 1000-round transaction lifetime.
fn harness() -> EngineHarness {
    init_test_tracing();
    EngineHarness::new(1000, 1000)
}

// ─────────────────────────────────────────────────────────────────────────────
// Single Renewal
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_renewal_generates_registers_and_confirms() {
    let h = harness();
    h.store.install(fixtures::credential("ALICE", 0, 1500));
    let engine = h.engine();

    let outcome = assert_ok(
        engine
            .run_single_renewal(RenewalRequest::new("ALICE", 3000).fee(2000))
            .await,
    );

    let credential = &outcome.credential.credential;
    assert_eq!(credential.first_valid, Round(1000));
    assert_eq!(credential.last_valid, Round(3000));
    assert_eq!(credential.key_dilution, default_key_dilution(Round(1000), Round(3000)));
    assert!(h.store.contains(&outcome.credential.handle));
    assert_confirmed_at(&outcome.dispatch, 1001);

    let submitted = h.signer.submitted();
    assert_eq!(submitted.len(), 1);
    let txn = &submitted[0];
    assert_eq!(txn.first_valid, Round(1000));
    assert_eq!(txn.last_valid, Round(2000));
    assert_eq!(txn.fee, 2000);
    let registration = txn.registration.as_ref().expect("go-online transaction");
    assert_eq!(registration.vote_first, Round(1000));
    assert_eq!(registration.vote_last, Round(3000));
    assert_eq!(registration.vote_verifier, credential.vote_verifier);
}

#[tokio::test]
async fn test_renewal_rejects_short_window_before_generating() {
    let h = harness();
    let engine = h.engine();

    let err = assert_err(engine.run_single_renewal(RenewalRequest::new("ALICE", 1500)).await);

    match err {
        LifecycleError::WindowTooShort(WindowTooShort {
            requested,
            current,
            max_txn_life,
        }) => {
            assert_eq!(requested, Round(1500));
            assert_eq!(current, Round(1000));
            assert_eq!(max_txn_life, 1000);
        }
        other => panic!("expected WindowTooShort, got {other:?}"),
    }
    assert!(h.store.generation_requests().is_empty());
    assert!(h.signer.submitted().is_empty());
}

#[tokio::test]
async fn test_renewal_window_boundary_is_exclusive() {
    let h = harness();
    let engine = h.engine();

    let err = assert_err(engine.run_single_renewal(RenewalRequest::new("ALICE", 2000)).await);
    assert!(matches!(err, LifecycleError::WindowTooShort(_)));

    assert_ok(engine.run_single_renewal(RenewalRequest::new("ALICE", 2001)).await);
}

#[tokio::test]
async fn test_renewal_refuses_when_existing_credential_covers_horizon() {
    let h = harness();
    h.store.install(fixtures::credential("ALICE", 0, 5000));
    let engine = h.engine();

    let err = assert_err(engine.run_single_renewal(RenewalRequest::new("ALICE", 3000)).await);

    match err {
        LifecycleError::ExistingCredential {
            requested,
            existing,
        } => {
            assert_eq!(requested, Round(3000));
            assert_eq!(existing, Round(5000));
        }
        other => panic!("expected ExistingCredential, got {other:?}"),
    }
    assert!(h.store.generation_requests().is_empty());
}

#[tokio::test]
async fn test_other_accounts_do_not_block_renewal() {
    let h = harness();
    h.store.install(fixtures::credential("BOB", 0, 9000));
    let engine = h.engine();

    assert_ok(engine.run_single_renewal(RenewalRequest::new("ALICE", 3000)).await);
}

#[tokio::test]
async fn test_submit_failure_rolls_back_generated_credential() {
    let h = harness();
    let original = h.store.install(fixtures::credential("ALICE", 0, 1500));
    h.signer.fail_for(&fixtures::address("ALICE"));
    let engine = h.engine();

    let err = assert_err(engine.run_single_renewal(RenewalRequest::new("ALICE", 3000)).await);

    let rolled_back = match err {
        LifecycleError::RegistrationFailed {
            address,
            rolled_back,
            ..
        } => {
            assert_eq!(address, fixtures::address("ALICE"));
            rolled_back.expect("generated credential rolled back")
        }
        other => panic!("expected RegistrationFailed, got {other:?}"),
    };

    assert!(!h.store.contains(&rolled_back));
    assert_eq!(h.store.deleted(), vec![rolled_back]);
    assert!(h.store.contains(&original));
    let listed = assert_ok(engine.list_credentials().await);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].handle, original);
}

#[tokio::test]
async fn test_failed_rollback_is_reported_not_hidden() {
    let h = harness();
    h.signer.fail_for(&fixtures::address("ALICE"));
    h.store.fail_deletes();
    let engine = h.engine();

    let err = assert_err(engine.run_single_renewal(RenewalRequest::new("ALICE", 3000)).await);

    assert!(matches!(
        err,
        LifecycleError::RegistrationFailed {
            rolled_back: None,
            ..
        }
    ));
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn test_generation_failure_leaves_nothing_behind() {
    let h = harness();
    h.store.fail_generation_for(&fixtures::address("ALICE"));
    let engine = h.engine();

    let err = assert_err(engine.run_single_renewal(RenewalRequest::new("ALICE", 3000)).await);

    assert!(matches!(err, LifecycleError::GenerationFailed(_)));
    assert!(h.store.is_empty());
    assert!(h.store.deleted().is_empty());
    assert!(h.signer.submitted().is_empty());
}

#[tokio::test]
async fn test_pool_rejection_keeps_credential() {
    let h = harness();
    h.ledger
        .script_statuses([PendingTransactionStatus::rejected("fee too low")]);
    let engine = h.engine();

    let err = assert_err(engine.run_single_renewal(RenewalRequest::new("ALICE", 3000)).await);

    assert!(err.is_pool_rejection());
    assert!(h.store.deleted().is_empty());
    assert_eq!(h.store.credentials_for(&fixtures::address("ALICE")).len(), 1);
}

#[tokio::test]
async fn test_fire_and_forget_skips_polling() {
    let h = harness();
    let engine = h.engine();

    let outcome = assert_ok(
        engine
            .run_single_renewal(RenewalRequest::new("ALICE", 3000).wait_mode(WaitMode::FireAndForget))
            .await,
    );

    assert!(matches!(outcome.dispatch, DispatchOutcome::Submitted { .. }));
    assert_eq!(h.ledger.query_count(), 0);
}

#[tokio::test]
async fn test_configured_wait_mode_applies_by_default() {
    let h = harness();
    let engine = h.engine_with_config(EngineConfig {
        wait_mode: WaitMode::FireAndForget,
        ..EngineConfig::default()
    });

    let outcome = assert_ok(engine.run_single_renewal(RenewalRequest::new("ALICE", 3000)).await);

    assert!(matches!(outcome.dispatch, DispatchOutcome::Submitted { .. }));
}

#[tokio::test]
async fn test_export_writes_unsigned_envelope_with_multisig_template() {
    let h = harness();
    let alice = fixtures::address("ALICE");
    h.signer.register_multisig(
        &alice,
        MultisigInfo {
            version: 1,
            threshold: 2,
            public_keys: vec![[1; 32], [2; 32], [3; 32]],
        },
    );
    let engine = h.engine();

    let outcome = assert_ok(
        engine
            .run_single_renewal(RenewalRequest::new("ALICE", 3000).export_to("/out/alice.txn"))
            .await,
    );

    assert_eq!(
        outcome.dispatch,
        DispatchOutcome::Exported {
            path: "/out/alice.txn".into()
        }
    );
    assert!(h.signer.submitted().is_empty());
    assert!(h.store.contains(&outcome.credential.handle));

    let bytes = h.sink.get(Path::new("/out/alice.txn")).expect("artifact written");
    let envelope = SignedTransactionEnvelope::from_cbor(&bytes).unwrap();
    assert!(!envelope.is_signed());
    assert!(envelope.txn.goes_online());
    let msig = envelope.msig.expect("multisig template");
    assert_eq!(msig.threshold, 2);
    assert_eq!(msig.subsigs.len(), 3);
    assert!(msig.subsigs.iter().all(|s| s.sig.is_empty()));
}

#[tokio::test]
async fn test_export_failure_keeps_credential() {
    let h = harness();
    h.sink.fail_writes();
    let engine = h.engine();

    let err = assert_err(
        engine
            .run_single_renewal(RenewalRequest::new("ALICE", 3000).export_to("/out/alice.txn"))
            .await,
    );

    assert!(matches!(err, LifecycleError::Export { .. }));
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn test_export_fails_when_multisig_lookup_fails() {
    let h = harness();
    h.signer.register_multisig(
        &fixtures::address("ALICE"),
        MultisigInfo {
            version: 1,
            threshold: 2,
            public_keys: vec![[1; 32], [2; 32]],
        },
    );
    h.signer.fail_multisig_lookup();
    let engine = h.engine();

    let err = assert_err(
        engine
            .run_single_renewal(RenewalRequest::new("ALICE", 3000).export_to("/out/alice.txn"))
            .await,
    );

    match err {
        LifecycleError::Export { path, .. } => assert_eq!(path, Path::new("/out/alice.txn")),
        other => panic!("expected Export, got {other:?}"),
    }
    assert!(h.sink.is_empty());
    assert!(h.signer.submitted().is_empty());
}

#[tokio::test]
async fn test_unknown_consensus_version() {
    init_test_tracing();
    let engine = LifecycleEngine::builder()
        .ledger(Arc::new(ScriptedLedger::at_round(1000).with_version("future-v9")))
        .store(Arc::new(partkey_testkit::MemoryCredentialStore::new()))
        .signer(Arc::new(partkey_testkit::ScriptedSigner::new()))
        .protocols(fixtures::protocols(1000))
        .build()
        .unwrap();

    let err = assert_err(engine.run_single_renewal(RenewalRequest::new("ALICE", 3000)).await);

    assert!(matches!(err, LifecycleError::UnknownProtocol(_)));
}

#[tokio::test]
async fn test_unreachable_node_is_query_failure() {
    let h = harness();
    h.ledger.fail_round_queries();
    let engine = h.engine();

    let err = assert_err(engine.run_single_renewal(RenewalRequest::new("ALICE", 3000)).await);

    assert!(matches!(err, LifecycleError::QueryFailed(_)));
}

#[tokio::test]
async fn test_timeout_stops_waiting_but_keeps_submission() {
    let h = harness();
    h.ledger
        .script_statuses([PendingTransactionStatus::pending()]);
    h.ledger.hang_waits();
    let engine = h.engine();

    let result = tokio::time::timeout(
        Duration::from_millis(100),
        engine.run_single_renewal(RenewalRequest::new("ALICE", 3000)),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(h.signer.submitted().len(), 1);
    assert_eq!(h.store.len(), 1);
    assert!(h.store.deleted().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Online Status Changes
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_go_offline_has_no_registration() {
    let h = harness();
    let engine = h.engine();

    let outcome = assert_ok(
        engine
            .change_online_status(StatusChangeRequest::new("ALICE", StatusIntent::Offline))
            .await,
    );

    assert_confirmed_at(&outcome, 1001);
    let txn = &h.signer.submitted()[0];
    assert!(!txn.goes_online());
    assert_eq!(txn.first_valid, Round(1000));
    assert_eq!(txn.last_valid, Round(2000));
}

#[tokio::test]
async fn test_go_online_selects_latest_installed_credential() {
    let h = harness();
    h.store.install(fixtures::credential("ALICE", 0, 1500));
    h.store.install(fixtures::credential("ALICE", 0, 4000));
    h.store.install(fixtures::credential("BOB", 0, 9000));
    let engine = h.engine();

    assert_ok(
        engine
            .change_online_status(StatusChangeRequest::new("ALICE", StatusIntent::Online(None)))
            .await,
    );

    let txn = &h.signer.submitted()[0];
    let registration = txn.registration.as_ref().expect("go-online transaction");
    assert_eq!(registration.vote_last, Round(4000));
}

#[tokio::test]
async fn test_go_online_with_explicit_credential_and_window() {
    let h = harness();
    let engine = h.engine();
    let mut request = StatusChangeRequest::new(
        "ALICE",
        StatusIntent::Online(Some(fixtures::credential("ALICE", 900, 8000))),
    );
    request.first_valid = Some(Round(1200));
    request.valid_rounds = Some(10);
    request.fee = Some(5);

    assert_ok(engine.change_online_status(request).await);

    let txn = &h.signer.submitted()[0];
    assert_eq!(txn.first_valid, Round(1200));
    assert_eq!(txn.last_valid, Round(1210));
    assert_eq!(txn.fee, 5);
    assert_eq!(txn.registration.as_ref().unwrap().vote_first, Round(900));
}

#[tokio::test]
async fn test_zero_window_values_mean_defaults() {
    let h = harness();
    let engine = h.engine();
    let mut request = StatusChangeRequest::new("ALICE", StatusIntent::Offline);
    request.first_valid = Some(Round::ZERO);
    request.valid_rounds = Some(0);

    assert_ok(engine.change_online_status(request).await);

    let txn = &h.signer.submitted()[0];
    assert_eq!(txn.first_valid, Round(1000));
    assert_eq!(txn.last_valid, Round(2000));
}

#[tokio::test]
async fn test_go_online_without_credential() {
    let h = harness();
    h.store.install(fixtures::credential("BOB", 0, 9000));
    let engine = h.engine();

    let err = assert_err(
        engine
            .change_online_status(StatusChangeRequest::new("ALICE", StatusIntent::Online(None)))
            .await,
    );

    assert!(matches!(err, LifecycleError::NoCredential(a) if a.as_str() == "ALICE"));
    assert!(h.signer.submitted().is_empty());
}

#[tokio::test]
async fn test_status_change_submit_failure_has_nothing_to_roll_back() {
    let h = harness();
    h.store.install(fixtures::credential("ALICE", 0, 4000));
    h.signer.fail_for(&fixtures::address("ALICE"));
    let engine = h.engine();

    let err = assert_err(
        engine
            .change_online_status(StatusChangeRequest::new("ALICE", StatusIntent::Online(None)))
            .await,
    );

    assert!(matches!(
        err,
        LifecycleError::RegistrationFailed {
            rolled_back: None,
            ..
        }
    ));
    assert_eq!(h.store.len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Credential Management
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_credentials_sorted_by_handle() {
    let h = harness();
    h.store.install(fixtures::credential("ZED", 0, 100));
    h.store.install(fixtures::credential("ALICE", 0, 200));
    h.store.install(fixtures::credential("MIKE", 0, 300));
    let engine = h.engine();

    let listed = assert_ok(engine.list_credentials().await);

    let addresses: Vec<&str> = listed.iter().map(|c| c.address.as_str()).collect();
    assert_eq!(addresses, vec!["ALICE", "MIKE", "ZED"]);
    assert_eq!(listed[0].last_valid, Round(200));
}

#[tokio::test]
async fn test_list_credentials_reports_verifiers() {
    let h = harness();
    h.store.install(fixtures::credential("ALICE", 0, 200));
    let engine = h.engine();

    let listed = assert_ok(engine.list_credentials().await);

    assert_eq!(listed[0].vote_verifier, [0xAA; 32]);
    assert_eq!(listed[0].selection_verifier, [0xBB; 32]);
    let value = serde_json::to_value(&listed[0]).unwrap();
    assert_eq!(value["vote_verifier"], "aa".repeat(32));
    assert_eq!(value["selection_verifier"], "bb".repeat(32));
    assert_eq!(value["key_dilution"], 32);
}

#[tokio::test]
async fn test_add_credential_derives_default_dilution() {
    let h = harness();
    let engine = h.engine();
    let alice = fixtures::address("ALICE");

    let generated = assert_ok(
        engine
            .add_credential(
                &alice,
                Round(1000),
                Round(3_000_000),
                None,
                &CredentialDestination::Managed,
            )
            .await,
    );

    assert_eq!(generated.credential.key_dilution, 1732);
    assert!(h.store.contains(&generated.handle));
}

#[tokio::test]
async fn test_add_credential_explicit_dilution() {
    let h = harness();
    let engine = h.engine();

    let generated = assert_ok(
        engine
            .add_credential(
                &fixtures::address("ALICE"),
                Round(0),
                Round(10_000),
                Some(64),
                &CredentialDestination::Managed,
            )
            .await,
    );

    assert_eq!(generated.credential.key_dilution, 64);
}

#[tokio::test]
async fn test_add_credential_into_directory() {
    let h = harness();
    let engine = h.engine();
    let dir = tempfile::tempdir().unwrap();

    let generated = assert_ok(
        engine
            .add_credential(
                &fixtures::address("ALICE"),
                Round(0),
                Round(10_000),
                None,
                &CredentialDestination::Directory(dir.path().to_path_buf()),
            )
            .await,
    );

    assert!(generated.handle.as_path().starts_with(dir.path()));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_add_credential_missing_directory() {
    let h = harness();
    let engine = h.engine();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");

    let err = assert_err(
        engine
            .add_credential(
                &fixtures::address("ALICE"),
                Round(0),
                Round(10_000),
                None,
                &CredentialDestination::Directory(missing.clone()),
            )
            .await,
    );

    assert!(matches!(err, LifecycleError::OutputDirMissing(p) if p == missing));
    assert!(h.store.generation_requests().is_empty());
}

#[tokio::test]
async fn test_add_credential_inverted_range() {
    let h = harness();
    let engine = h.engine();

    let err = assert_err(
        engine
            .add_credential(
                &fixtures::address("ALICE"),
                Round(500),
                Round(100),
                None,
                &CredentialDestination::Managed,
            )
            .await,
    );

    assert!(matches!(err, LifecycleError::InvalidRange { .. }));
}
