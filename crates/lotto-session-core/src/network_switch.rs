//! Switch-or-add protocol for moving the wallet to a target chain.
//!
//! This is the only caller of `wallet_switchEthereumChain` /
//! `wallet_addEthereumChain`. A single-flight latch suppresses duplicate
//! wallet prompts; it is released by a drop guard so no exit path, including
//! a cancelled future, can leave it set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::{ChainId, CorrelationId};
use crate::error::{classify, WalletError};
use crate::networks::NetworkDescriptor;
use crate::ports::{ClockPort, NotifierPort, StoragePort, WalletPort};
use crate::session::SessionManager;
use crate::wire::{json_chain_id, ETH_CHAIN_ID, WALLET_ADD_CHAIN, WALLET_SWITCH_CHAIN};

#[derive(Debug, Clone)]
pub struct SwitchOptions {
    /// Wait before re-reading `eth_chainId` after a successful switch.
    pub confirm_delay_ms: u64,
    /// Number of delayed re-reads before reporting a mismatch.
    pub confirm_attempts: u32,
}

impl Default for SwitchOptions {
    fn default() -> Self {
        Self {
            confirm_delay_ms: 1_000,
            confirm_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    AlreadyActive,
    Switched,
    AddedAndSwitched,
    /// Another switch was in flight; nothing was requested.
    Skipped,
}

pub struct NetworkSwitcher<W, S, N, C>
where
    W: WalletPort,
    S: StoragePort,
    N: NotifierPort,
    C: ClockPort,
{
    session: Arc<SessionManager<W, S>>,
    notifier: N,
    clock: C,
    options: SwitchOptions,
    in_flight: AtomicBool,
}

impl<W, S, N, C> NetworkSwitcher<W, S, N, C>
where
    W: WalletPort,
    S: StoragePort,
    N: NotifierPort,
    C: ClockPort,
{
    pub fn new(
        session: Arc<SessionManager<W, S>>,
        notifier: N,
        clock: C,
        options: SwitchOptions,
    ) -> Self {
        Self {
            session,
            notifier,
            clock,
            options,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_switching(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn switch_to(&self, target: &str) -> Result<SwitchOutcome, WalletError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!(target, "network switch already in flight, ignoring");
            return Ok(SwitchOutcome::Skipped);
        };

        let descriptor = self
            .session
            .registry()
            .by_name(target)
            .ok_or_else(|| WalletError::UnknownNetwork(target.to_owned()))?;
        let wallet = self.session.wallet();
        if !wallet.is_available() {
            return Err(WalletError::NoWalletDetected);
        }

        let current = json_chain_id(&wallet.request(ETH_CHAIN_ID, json!([])).await?)?;
        if current == descriptor.chain_id {
            self.session.set_active_chain(&descriptor.name)?;
            return Ok(SwitchOutcome::AlreadyActive);
        }

        let id = CorrelationId::from_clock("switch", self.clock.now_ms()?);
        self.notifier.show_loading(
            &id,
            &format!("Switching to {}...", descriptor.chain_name),
        );
        info!(from = current, to = descriptor.chain_id, "switching network");

        match self.switch_and_confirm(&descriptor).await {
            Ok(outcome) => {
                self.session.set_active_chain(&descriptor.name)?;
                self.notifier.show_success(
                    &id,
                    &format!("Switched to {}", descriptor.chain_name),
                    None,
                );
                info!(network = %descriptor.name, ?outcome, "network switched");
                Ok(outcome)
            }
            Err(err) => {
                if err.is_prompt_outcome() {
                    info!(error = %err, "network switch not completed");
                } else {
                    warn!(error = %err, "network switch failed");
                }
                self.session.record_error(&err);
                self.notifier.show_error(&id, &err.user_message());
                Err(err)
            }
        }
    }

    async fn switch_and_confirm(
        &self,
        descriptor: &NetworkDescriptor,
    ) -> Result<SwitchOutcome, WalletError> {
        let wallet = self.session.wallet();
        let chain_id = descriptor.chain_id;

        let outcome = match wallet
            .request(WALLET_SWITCH_CHAIN, descriptor.switch_params())
            .await
        {
            Ok(_) => SwitchOutcome::Switched,
            Err(e) => match classify(&e) {
                WalletError::ChainUnknownToWallet(_) => {
                    info!(chain_id, "chain unknown to wallet, adding it");
                    wallet
                        .request(WALLET_ADD_CHAIN, descriptor.add_chain_params())
                        .await
                        .map_err(|e| with_chain(classify(&e), chain_id))?;
                    wallet
                        .request(WALLET_SWITCH_CHAIN, descriptor.switch_params())
                        .await
                        .map_err(|e| with_chain(classify(&e), chain_id))?;
                    SwitchOutcome::AddedAndSwitched
                }
                other => return Err(other),
            },
        };

        self.confirm(chain_id).await?;
        Ok(outcome)
    }

    /// Some wallets apply the switch after resolving the request.
    async fn confirm(&self, expected: ChainId) -> Result<(), WalletError> {
        let wallet = self.session.wallet();
        let mut actual = expected;
        for attempt in 0..self.options.confirm_attempts.max(1) {
            self.clock.sleep_ms(self.options.confirm_delay_ms).await;
            actual = json_chain_id(&wallet.request(ETH_CHAIN_ID, json!([])).await?)?;
            if actual == expected {
                return Ok(());
            }
            debug!(attempt, expected, actual, "wallet chain not updated yet");
        }
        Err(WalletError::ChainMismatchAfterSwitch { expected, actual })
    }
}

fn with_chain(err: WalletError, chain_id: ChainId) -> WalletError {
    match err {
        WalletError::ChainUnknownToWallet(_) => WalletError::ChainUnknownToWallet(chain_id),
        other => other,
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
