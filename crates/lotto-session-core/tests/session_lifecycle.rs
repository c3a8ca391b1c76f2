mod common;

use common::{
    account_a, account_b, harness, harness_with, MemoryStorage, ScriptedWallet, MOONBASE_ID,
};
use lotto_session_core::session::ACCOUNT_STORAGE_KEY;
use lotto_session_core::wire::{ETH_ACCOUNTS, ETH_CHAIN_ID, ETH_REQUEST_ACCOUNTS};
use lotto_session_core::{
    ActiveChain, PortError, ProviderEvent, ProviderEventKind, SessionState, WalletError,
};

#[tokio::test]
async fn remembered_account_is_restored_without_prompt() {
    let wallet = ScriptedWallet::authorized(vec![account_a()]);
    let storage = MemoryStorage::seeded(ACCOUNT_STORAGE_KEY, &account_a().to_checksum(None));
    let h = harness_with(wallet, storage);

    let session = h.session.initialize_provider().await.expect("initialize");

    assert_eq!(session.account, Some(account_a()));
    assert_eq!(session.state, SessionState::Connected);
    assert_eq!(session.active_chain_name(), Some("Minato"));
    assert!(session.read_provider.is_some());
    assert_eq!(h.wallet.calls(ETH_REQUEST_ACCOUNTS), 0);
}

#[tokio::test]
async fn restored_session_adopts_the_wallet_chain() {
    let wallet = ScriptedWallet::authorized(vec![account_a()]);
    wallet.script().chain_id = MOONBASE_ID;
    let storage = MemoryStorage::seeded(ACCOUNT_STORAGE_KEY, &account_a().to_checksum(None));
    let h = harness_with(wallet, storage);

    let session = h.session.initialize_provider().await.expect("initialize");

    assert_eq!(session.active_chain_name(), Some("Moonbase"));
    assert_eq!(session.read_provider.map(|r| r.chain_id), Some(MOONBASE_ID));
    assert_eq!(session.account, Some(account_a()));
    assert_eq!(h.wallet.calls(ETH_CHAIN_ID), 1);
}

#[tokio::test]
async fn connect_on_unsupported_wallet_chain_is_unresolved() {
    let wallet = ScriptedWallet::default();
    wallet.script().chain_id = 1;
    let h = harness(wallet);
    h.session.initialize_provider().await.expect("initialize");

    let session = h.session.connect().await.expect("connect");

    assert_eq!(session.account, Some(account_a()));
    assert_eq!(session.active_chain, ActiveChain::Unresolved(1));
    assert!(session.read_provider.is_none());
}

#[tokio::test]
async fn failed_chain_query_fails_reconciliation() {
    let h = harness(ScriptedWallet::authorized(vec![account_a()]));
    h.session.initialize_provider().await.expect("initialize");
    h.wallet
        .push_response(ETH_CHAIN_ID, Err(PortError::Transport("wallet went away".to_owned())));

    let err = h.session.check_and_reconcile().await.expect_err("chain query");

    assert!(matches!(err, WalletError::Unexpected(_)));
    let snapshot = h.session.snapshot().expect("snapshot");
    assert!(snapshot.account.is_none());
    assert_eq!(snapshot.last_error, Some(err));
}

#[tokio::test]
async fn fresh_visit_stays_disconnected_until_connect() {
    let h = harness(ScriptedWallet::authorized(vec![account_a()]));

    let session = h.session.initialize_provider().await.expect("initialize");

    assert_eq!(session.state, SessionState::Disconnected);
    assert!(session.account.is_none());
    assert_eq!(h.wallet.calls(ETH_ACCOUNTS), 0);
}

#[tokio::test]
async fn missing_wallet_is_reported_once() {
    let h = harness(ScriptedWallet::missing());

    let err = h.session.initialize_provider().await.expect_err("no wallet");

    assert_eq!(err, WalletError::NoWalletDetected);
    let snapshot = h.session.snapshot().expect("snapshot");
    assert_eq!(snapshot.state, SessionState::Uninitialized);
    assert_eq!(snapshot.last_error, Some(WalletError::NoWalletDetected));
    assert_eq!(
        h.session.connect().await.expect_err("connect without provider"),
        WalletError::ProviderNotInitialized
    );
}

#[tokio::test]
async fn connect_persists_account() {
    let h = harness(ScriptedWallet::default());
    h.session.initialize_provider().await.expect("initialize");

    let session = h.session.connect().await.expect("connect");

    assert_eq!(session.account, Some(account_a()));
    assert!(session.is_connected());
    assert!(!session.is_connecting());
    assert_eq!(
        h.storage.value(ACCOUNT_STORAGE_KEY),
        Some(account_a().to_checksum(None))
    );
}

#[tokio::test]
async fn rejected_connect_returns_to_disconnected() {
    let h = harness(ScriptedWallet::default());
    h.session.initialize_provider().await.expect("initialize");
    h.wallet.push_response(
        ETH_REQUEST_ACCOUNTS,
        Err(PortError::rpc(4001, "User rejected the request.")),
    );

    let err = h.session.connect().await.expect_err("rejected");

    assert_eq!(err, WalletError::UserRejected);
    let snapshot = h.session.snapshot().expect("snapshot");
    assert_eq!(snapshot.state, SessionState::Disconnected);
    assert!(!snapshot.is_connecting());
    assert_eq!(snapshot.last_error, Some(WalletError::UserRejected));
    assert!(h.storage.value(ACCOUNT_STORAGE_KEY).is_none());
}

#[tokio::test]
async fn pending_prompt_is_surfaced_without_retry() {
    let h = harness(ScriptedWallet::default());
    h.session.initialize_provider().await.expect("initialize");
    h.wallet.push_response(
        ETH_REQUEST_ACCOUNTS,
        Err(PortError::rpc(-32002, "Request of type 'wallet_requestPermissions' already pending")),
    );

    let err = h.session.connect().await.expect_err("pending");

    assert_eq!(err, WalletError::RequestAlreadyPending);
    assert_eq!(h.wallet.calls(ETH_REQUEST_ACCOUNTS), 1);
    assert!(!h.session.snapshot().expect("snapshot").is_connecting());
}

#[tokio::test]
async fn second_connect_while_connecting_is_refused() {
    let h = harness(ScriptedWallet::default());
    h.session.initialize_provider().await.expect("initialize");
    let gate = h.wallet.gate(ETH_REQUEST_ACCOUNTS);

    let (first, second) = tokio::join!(h.session.connect(), async {
        let result = h.session.connect().await;
        gate.notify_one();
        result
    });

    assert_eq!(first.expect("first connect").account, Some(account_a()));
    assert_eq!(second.expect_err("second connect"), WalletError::ConnectInProgress);
    assert_eq!(h.wallet.calls(ETH_REQUEST_ACCOUNTS), 1);
}

#[tokio::test]
async fn cleared_accounts_mid_connect_keep_connect_exclusive() {
    let h = harness(ScriptedWallet::default());
    h.session.initialize_provider().await.expect("initialize");
    let gate = h.wallet.gate(ETH_REQUEST_ACCOUNTS);

    let (first, (mid_flight, second)) = tokio::join!(h.session.connect(), async {
        h.session
            .handle_event(ProviderEvent {
                sequence: 1,
                kind: ProviderEventKind::AccountsChanged(Vec::new()),
            })
            .await
            .expect("downgrade");
        let mid_flight = h.session.snapshot().expect("snapshot");
        let second = h.session.connect().await;
        gate.notify_one();
        (mid_flight, second)
    });

    assert_eq!(mid_flight.state, SessionState::Disconnected);
    assert!(mid_flight.is_connecting());
    assert_eq!(second.expect_err("second connect"), WalletError::ConnectInProgress);
    assert_eq!(first.expect("first connect").account, Some(account_a()));
    assert_eq!(h.wallet.calls(ETH_REQUEST_ACCOUNTS), 1);
    let snapshot = h.session.snapshot().expect("snapshot");
    assert_eq!(snapshot.state, SessionState::Connected);
    assert!(!snapshot.is_connecting());
}

#[tokio::test]
async fn repeated_reconciliation_is_idempotent() {
    let h = harness(ScriptedWallet::authorized(vec![account_a()]));
    h.session.initialize_provider().await.expect("initialize");

    let once = h.session.check_and_reconcile().await.expect("once");
    let mut last = once.clone();
    for _ in 0..4 {
        last = h.session.check_and_reconcile().await.expect("again");
    }

    assert_eq!(last.account, once.account);
    assert_eq!(last.active_chain, once.active_chain);
    assert_eq!(last.binding_generation, once.binding_generation);
    assert_eq!(last.state, SessionState::Connected);
}

#[tokio::test]
async fn disconnect_clears_account_and_storage() {
    let h = common::connected_harness().await;
    h.wallet.emit(ProviderEventKind::ChainChanged(1));
    h.session.process_events().await.expect("events");

    let session = h.session.disconnect().expect("disconnect");

    assert!(session.account.is_none());
    assert!(session.signer.is_none());
    assert_eq!(session.state, SessionState::Disconnected);
    assert!(h.storage.value(ACCOUNT_STORAGE_KEY).is_none());
}

#[tokio::test]
async fn empty_accounts_event_downgrades_session() {
    let h = common::connected_harness().await;
    h.session.register_handlers().expect("register");
    assert!(h.wallet.script().subscribed);

    h.wallet.script().authorized.clear();
    h.wallet.emit(ProviderEventKind::AccountsChanged(Vec::new()));
    let summary = h.session.process_events().await.expect("events");

    assert_eq!(summary.drained_events, 1);
    assert!(summary.accounts_changed);
    assert_eq!(summary.latest_account_count, 0);
    let snapshot = h.session.snapshot().expect("snapshot");
    assert_eq!(snapshot.state, SessionState::Disconnected);
    assert!(snapshot.account.is_none());
    assert!(h.storage.value(ACCOUNT_STORAGE_KEY).is_none());

    h.session.unregister_handlers().expect("unregister");
    assert!(!h.wallet.script().subscribed);
}

#[tokio::test]
async fn account_switch_in_wallet_is_followed() {
    let h = common::connected_harness().await;

    h.wallet.script().authorized = vec![account_b(), account_a()];
    h.wallet
        .emit(ProviderEventKind::AccountsChanged(vec![account_b(), account_a()]));
    h.session.process_events().await.expect("events");

    assert_eq!(h.session.account().expect("account"), Some(account_b()));
    assert_eq!(
        h.storage.value(ACCOUNT_STORAGE_KEY),
        Some(account_b().to_checksum(None))
    );
}

#[tokio::test]
async fn failed_event_does_not_drop_later_events() {
    let h = common::connected_harness().await;
    h.wallet
        .push_response(ETH_ACCOUNTS, Err(PortError::Transport("wallet went away".to_owned())));
    h.wallet.emit(ProviderEventKind::AccountsChanged(vec![account_b()]));
    h.wallet.emit(ProviderEventKind::ChainChanged(MOONBASE_ID));

    let err = h.session.process_events().await.expect_err("account query");

    assert!(matches!(err, WalletError::Unexpected(_)));
    let snapshot = h.session.snapshot().expect("snapshot");
    assert_eq!(snapshot.active_chain_name(), Some("Moonbase"));
    assert_eq!(snapshot.account, Some(account_a()));
    let summary = h.session.process_events().await.expect("queue drained");
    assert_eq!(summary.drained_events, 0);
}

#[tokio::test]
async fn stale_reconciliation_does_not_resurrect_account() {
    let h = harness(ScriptedWallet::default());
    h.session.initialize_provider().await.expect("initialize");
    let gate = h.wallet.gate(ETH_ACCOUNTS);

    let (connected, _) = tokio::join!(h.session.connect(), async {
        tokio::task::yield_now().await;
        h.session
            .handle_event(ProviderEvent {
                sequence: 1,
                kind: ProviderEventKind::AccountsChanged(Vec::new()),
            })
            .await
            .expect("downgrade");
        gate.notify_one();
    });

    let connected = connected.expect("connect resolves");
    assert!(connected.account.is_none());
    let snapshot = h.session.snapshot().expect("snapshot");
    assert!(snapshot.account.is_none());
    assert_eq!(snapshot.state, SessionState::Disconnected);
    assert!(h.storage.value(ACCOUNT_STORAGE_KEY).is_none());
}

#[tokio::test]
async fn unsupported_chain_is_unresolved_until_wallet_returns() {
    let h = common::connected_harness().await;
    let before = h.session.snapshot().expect("snapshot").binding_generation;

    h.wallet.emit(ProviderEventKind::ChainChanged(1));
    let summary = h.session.process_events().await.expect("events");
    assert!(summary.chain_unresolved);
    assert_eq!(summary.latest_chain_id, Some(1));

    let unresolved = h.session.snapshot().expect("snapshot");
    assert_eq!(unresolved.active_chain, ActiveChain::Unresolved(1));
    assert!(unresolved.read_provider.is_none());
    assert!(unresolved.binding_generation > before);
    assert_eq!(unresolved.account, Some(account_a()));

    h.wallet.emit(ProviderEventKind::ChainChanged(common::MOONBASE_ID));
    let summary = h.session.process_events().await.expect("events");
    assert!(!summary.chain_unresolved);
    assert_eq!(
        h.session.snapshot().expect("snapshot").active_chain_name(),
        Some("Moonbase")
    );
}

#[tokio::test]
async fn reinitialization_replaces_provider_handle() {
    let h = common::connected_harness().await;
    let first = h.session.snapshot().expect("snapshot");

    let second = h.session.initialize_provider().await.expect("reinitialize");

    let (Some(a), Some(b)) = (first.provider, second.provider) else {
        panic!("provider handles missing");
    };
    assert!(b.generation > a.generation);
    assert!(second.binding_generation > first.binding_generation);
    assert_eq!(second.account, Some(account_a()));
    assert_eq!(
        second.signer.map(|s| s.provider_generation),
        Some(b.generation)
    );
}
