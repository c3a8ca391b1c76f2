//! Wallet session state machine.
//!
//! One [`SessionManager`] owns the injected wallet for the lifetime of the
//! page. Every external event funnels through the pure `reduce_*` functions
//! below before the new snapshot is written back, so reconciliation stays
//! idempotent and testable without a wallet.
//!
//! Reconciliations race freely with wallet events. Each one takes an epoch
//! ticket when it starts and only writes back if no newer reconciliation or
//! disconnect started meanwhile; the latest one wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::Address;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::{
    ActiveChain, ChainId, EventRecoverySummary, ProviderEvent, ProviderEventKind, ProviderHandle,
    ReadProvider, Session, SignerCapability,
};
use crate::error::{classify, WalletError};
use crate::networks::{NetworkRegistry, MINATO};
use crate::ports::{PortError, StoragePort, WalletPort};
use crate::state_machine::{session_transition, SessionAction, SessionState, StateTransition};
use crate::wire::{
    json_chain_id, parse_accounts, ETH_ACCOUNTS, ETH_CHAIN_ID, ETH_REQUEST_ACCOUNTS,
};

pub const ACCOUNT_STORAGE_KEY: &str = "lotto-evm-account";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub default_chain: String,
    pub account_storage_key: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_chain: MINATO.to_owned(),
            account_storage_key: ACCOUNT_STORAGE_KEY.to_owned(),
        }
    }
}

pub struct SessionManager<W, S>
where
    W: WalletPort,
    S: StoragePort,
{
    wallet: W,
    storage: S,
    registry: Arc<NetworkRegistry>,
    options: SessionOptions,
    session: Mutex<Session>,
    handlers_registered: AtomicBool,
}

impl<W, S> SessionManager<W, S>
where
    W: WalletPort,
    S: StoragePort,
{
    pub fn new(
        wallet: W,
        storage: S,
        registry: Arc<NetworkRegistry>,
        options: SessionOptions,
    ) -> Result<Self, WalletError> {
        if registry.by_name(&options.default_chain).is_none() {
            return Err(WalletError::UnknownNetwork(options.default_chain));
        }
        let mut session = Session::new(options.default_chain.clone());
        session.read_provider = read_provider_for(&session.active_chain, &registry);
        Ok(Self {
            wallet,
            storage,
            registry,
            options,
            session: Mutex::new(session),
            handlers_registered: AtomicBool::new(false),
        })
    }

    pub fn snapshot(&self) -> Result<Session, WalletError> {
        Ok(self.lock()?.clone())
    }

    pub fn account(&self) -> Result<Option<Address>, WalletError> {
        Ok(self.lock()?.account)
    }

    pub fn registry(&self) -> &Arc<NetworkRegistry> {
        &self.registry
    }

    pub(crate) fn wallet(&self) -> &W {
        &self.wallet
    }

    /// Detects the injected wallet and installs a fresh provider handle.
    ///
    /// A remembered account from a previous visit triggers a silent
    /// reconciliation; nothing here prompts the user.
    pub async fn initialize_provider(&self) -> Result<Session, WalletError> {
        {
            let mut s = self.lock()?;
            apply(&mut s, SessionAction::BeginInit)?;
            if !self.wallet.is_available() {
                apply(&mut s, SessionAction::ProviderMissing)?;
                s.last_error = Some(WalletError::NoWalletDetected);
                warn!("no injected wallet detected");
                return Err(WalletError::NoWalletDetected);
            }
            let generation = s.provider.map(|p| p.generation + 1).unwrap_or(1);
            s.provider = Some(ProviderHandle { generation });
            s.signer = None;
            s.account = None;
            s.read_provider = read_provider_for(&s.active_chain, &self.registry);
            s.binding_generation += 1;
            s.last_error = None;
            apply(&mut s, SessionAction::ProviderReady)?;
            info!(generation, "wallet provider initialized");
        }

        let remembered = match self.storage.get(&self.options.account_storage_key) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "failed to read remembered account");
                None
            }
        };
        match remembered {
            Some(account) => {
                debug!(%account, "restoring remembered session");
                self.check_and_reconcile().await
            }
            None => self.snapshot(),
        }
    }

    /// Silent account and chain query (`eth_accounts`, `eth_chainId`) and
    /// write-back.
    ///
    /// Safe to call any number of times from any handler.
    pub async fn check_and_reconcile(&self) -> Result<Session, WalletError> {
        let (ticket, provider_generation) = {
            let mut s = self.lock()?;
            let provider = s.provider.ok_or(WalletError::ProviderNotInitialized)?;
            s.reconcile_epoch += 1;
            (s.reconcile_epoch, provider.generation)
        };

        let queried = self.query_accounts_and_chain().await;

        let mut s = self.lock()?;
        if s.reconcile_epoch != ticket
            || s.provider.map(|p| p.generation) != Some(provider_generation)
        {
            debug!(ticket, "stale reconciliation discarded");
            return Ok(s.clone());
        }

        let (accounts, chain_id) = match queried {
            Ok(queried) => queried,
            Err(e) => {
                let err = classify(&e);
                warn!(error = %e, "silent wallet query failed");
                s.last_error = Some(err.clone());
                return Err(err);
            }
        };

        if reduce_chain_changed(&mut s, chain_id, &self.registry) {
            debug!(chain_id, chain = ?s.active_chain, "wallet chain picked up on reconcile");
        }
        reduce_accounts(&mut s, &accounts, &self.registry)?;
        self.persist_account(s.account);
        debug!(
            account = ?s.account,
            chain = ?s.active_chain,
            state = ?s.state,
            "session reconciled"
        );
        Ok(s.clone())
    }

    async fn query_accounts_and_chain(&self) -> Result<(Vec<Address>, ChainId), PortError> {
        let accounts = parse_accounts(&self.wallet.request(ETH_ACCOUNTS, json!([])).await?)?;
        let chain_id = json_chain_id(&self.wallet.request(ETH_CHAIN_ID, json!([])).await?)?;
        Ok((accounts, chain_id))
    }

    /// User-initiated connect; may open the wallet prompt.
    pub async fn connect(&self) -> Result<Session, WalletError> {
        {
            let mut s = self.lock()?;
            if s.provider.is_none() {
                return Err(WalletError::ProviderNotInitialized);
            }
            if s.is_connecting() {
                return Err(WalletError::ConnectInProgress);
            }
            apply(&mut s, SessionAction::BeginConnect)?;
            s.connect_pending = true;
            s.last_error = None;
        }
        info!("wallet connect requested");

        let guard = ConnectingGuard { session: &self.session };
        let result = self.request_and_reconcile().await;
        drop(guard);

        match &result {
            Ok(s) => match s.account {
                Some(account) => info!(%account, "wallet connected"),
                None => info!("wallet connect ended without an account"),
            },
            Err(err) => {
                if err.is_prompt_outcome() {
                    info!(error = %err, "wallet connect not completed");
                } else {
                    warn!(error = %err, "wallet connect failed");
                }
                self.lock()?.last_error = Some(err.clone());
            }
        }
        result
    }

    async fn request_and_reconcile(&self) -> Result<Session, WalletError> {
        let value = self
            .wallet
            .request(ETH_REQUEST_ACCOUNTS, json!([]))
            .await?;
        let authorized = parse_accounts(&value)?;
        debug!(count = authorized.len(), "accounts authorized by wallet");
        self.check_and_reconcile().await
    }

    /// Forgets the account locally. Wallets cannot revoke authorization
    /// programmatically, so the extension itself is untouched.
    pub fn disconnect(&self) -> Result<Session, WalletError> {
        let snapshot = {
            let mut s = self.lock()?;
            s.reconcile_epoch += 1;
            clear_account(&mut s);
            if s.state != SessionState::Uninitialized && s.state != SessionState::Initializing {
                apply(&mut s, SessionAction::Disconnect)?;
            }
            s.last_error = None;
            s.clone()
        };
        self.persist_account(None);
        info!("wallet disconnected");
        Ok(snapshot)
    }

    pub async fn handle_event(&self, event: ProviderEvent) -> Result<Session, WalletError> {
        match event.kind {
            ProviderEventKind::AccountsChanged(accounts) if accounts.is_empty() => {
                info!(sequence = event.sequence, "wallet reported no accounts");
                self.disconnect()
            }
            ProviderEventKind::AccountsChanged(_) => self.check_and_reconcile().await,
            ProviderEventKind::ChainChanged(chain_id) => {
                let mut s = self.lock()?;
                if reduce_chain_changed(&mut s, chain_id, &self.registry) {
                    match &s.active_chain {
                        ActiveChain::Resolved(name) => info!(%name, chain_id, "active chain changed"),
                        ActiveChain::Unresolved(id) => {
                            warn!(chain_id = id, "wallet switched to an unsupported chain")
                        }
                    }
                }
                Ok(s.clone())
            }
        }
    }

    /// Drains queued wallet events and applies them in order.
    ///
    /// Every drained event is applied even if an earlier one fails; the
    /// first failure is returned afterwards.
    pub async fn process_events(&self) -> Result<EventRecoverySummary, WalletError> {
        let events = self.wallet.drain_events()?;
        let mut summary = EventRecoverySummary {
            drained_events: events.len(),
            ..EventRecoverySummary::default()
        };
        let mut first_error = None;
        for event in events {
            match &event.kind {
                ProviderEventKind::AccountsChanged(accounts) => {
                    summary.accounts_changed = true;
                    summary.latest_account_count = accounts.len();
                }
                ProviderEventKind::ChainChanged(chain_id) => {
                    summary.chain_changed = true;
                    summary.latest_chain_id = Some(*chain_id);
                }
            }
            let sequence = event.sequence;
            if let Err(err) = self.handle_event(event).await {
                warn!(sequence, error = %err, "wallet event not applied");
                first_error.get_or_insert(err);
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        summary.chain_unresolved =
            matches!(self.lock()?.active_chain, ActiveChain::Unresolved(_));
        Ok(summary)
    }

    pub fn register_handlers(&self) -> Result<(), WalletError> {
        if self.handlers_registered.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.wallet.subscribe() {
            self.handlers_registered.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        debug!("wallet event handlers registered");
        Ok(())
    }

    pub fn unregister_handlers(&self) -> Result<(), WalletError> {
        if !self.handlers_registered.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.wallet.unsubscribe()?;
        debug!("wallet event handlers unregistered");
        Ok(())
    }

    /// Records a confirmed chain switch.
    pub(crate) fn set_active_chain(&self, name: &str) -> Result<Session, WalletError> {
        let descriptor = self
            .registry
            .by_name(name)
            .ok_or_else(|| WalletError::UnknownNetwork(name.to_owned()))?;
        let mut s = self.lock()?;
        reduce_chain_changed(&mut s, descriptor.chain_id, &self.registry);
        s.last_error = None;
        Ok(s.clone())
    }

    pub(crate) fn record_error(&self, err: &WalletError) {
        if let Ok(mut s) = self.lock() {
            s.last_error = Some(err.clone());
        }
    }

    fn persist_account(&self, account: Option<Address>) {
        let key = &self.options.account_storage_key;
        let result = match account {
            Some(account) => self.storage.set(key, &account.to_checksum(None)),
            None => self.storage.remove(key),
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to persist account");
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>, PortError> {
        self.session
            .lock()
            .map_err(|e| PortError::Transport(format!("session lock poisoned: {e}")))
    }
}

/// Leaves `Connecting` and releases the connect latch on every exit path,
/// including a dropped future.
struct ConnectingGuard<'a> {
    session: &'a Mutex<Session>,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        let Ok(mut s) = self.session.lock() else {
            return;
        };
        s.connect_pending = false;
        if s.state != SessionState::Connecting {
            return;
        }
        let action = if s.account.is_some() {
            SessionAction::AccountsAuthorized
        } else {
            SessionAction::ConnectAborted
        };
        let _ = apply(&mut s, action);
    }
}

fn apply(session: &mut Session, action: SessionAction) -> Result<StateTransition, PortError> {
    let (to, transition) = session_transition(session.state, action)?;
    session.state = to;
    debug!(
        from = ?transition.from,
        to = ?transition.to,
        reason = transition.reason,
        "session transition"
    );
    Ok(transition)
}

fn clear_account(session: &mut Session) {
    if session.account.is_some() || session.signer.is_some() {
        session.binding_generation += 1;
    }
    session.account = None;
    session.signer = None;
}

fn read_provider_for(chain: &ActiveChain, registry: &NetworkRegistry) -> Option<ReadProvider> {
    let descriptor = registry.by_name(chain.name()?)?;
    Some(ReadProvider {
        chain_name: descriptor.name.clone(),
        chain_id: descriptor.chain_id,
        endpoint: descriptor.primary_rpc_url()?.to_owned(),
    })
}

/// Applies an account list (head = active account) to a session snapshot.
pub fn reduce_accounts(
    session: &mut Session,
    accounts: &[Address],
    registry: &NetworkRegistry,
) -> Result<(), PortError> {
    match accounts.first().copied() {
        Some(account) => {
            let provider_generation = session
                .provider
                .map(|p| p.generation)
                .ok_or_else(|| PortError::Policy("provider not initialized".to_owned()))?;
            let signer = SignerCapability {
                account,
                provider_generation,
            };
            if session.account != Some(account) || session.signer != Some(signer) {
                session.binding_generation += 1;
            }
            session.account = Some(account);
            session.signer = Some(signer);
            session.read_provider = read_provider_for(&session.active_chain, registry);
            session.last_error = None;
            apply(session, SessionAction::AccountsAuthorized)?;
        }
        None => {
            clear_account(session);
            apply(session, SessionAction::AccountsCleared)?;
        }
    }
    Ok(())
}

/// Resolves a wallet chain id against the registry. Returns whether the
/// active chain changed.
pub fn reduce_chain_changed(
    session: &mut Session,
    chain_id: ChainId,
    registry: &NetworkRegistry,
) -> bool {
    let next = registry
        .by_chain_id(chain_id)
        .map(|n| ActiveChain::Resolved(n.name.clone()))
        .unwrap_or(ActiveChain::Unresolved(chain_id));
    if session.active_chain == next {
        return false;
    }
    session.active_chain = next;
    session.read_provider = read_provider_for(&session.active_chain, registry);
    session.binding_generation += 1;
    true
}
