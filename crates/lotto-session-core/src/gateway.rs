//! Contract gateway: the three ways the client talks to the lottery contract.
//!
//! * [`ContractGateway::query`] reads through the session's read provider and
//!   works without a connected wallet.
//! * [`ContractGateway::dry_run`] simulates a write from the connected account
//!   and never produces a transaction.
//! * [`ContractGateway::submit_and_confirm`] sends through the wallet, waits for
//!   the receipt and reports every stage to the notifier under one id.
//!
//! Bindings are derived from the session snapshot at call time, so a binding
//! never outlives the provider, account or chain it was built for.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::sol_types::SolCall;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::abi::{decode_participation, refine_revert};
use crate::domain::{ActiveChain, ChainId, DryRunResult, Session, TxIntent, TxResult};
use crate::error::{classify, ContractRevert, WalletError};
use crate::ports::{ClockPort, NotifierPort, PortError, RpcPort, StoragePort, WalletPort};
use crate::session::SessionManager;
use crate::wire::{
    chain_id_hex, parse_bytes, parse_tx_hash, CallRequest, ReceiptView, ETH_CALL,
    ETH_GET_TRANSACTION_RECEIPT, ETH_SEND_TRANSACTION,
};

pub const MSG_TX_SENDING: &str = "Confirm the transaction in your wallet...";
pub const MSG_TX_PROCESSING: &str = "Processing transaction...";
pub const MSG_TX_SUCCESS: &str = "Transaction successful!";
pub const MSG_TX_CANCELLED: &str = "Transaction cancelled";

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub receipt_poll_interval_ms: u64,
    pub receipt_timeout_ms: u64,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            receipt_poll_interval_ms: 1_500,
            receipt_timeout_ms: 120_000,
        }
    }
}

impl GatewayOptions {
    fn max_receipt_polls(&self) -> u64 {
        (self.receipt_timeout_ms / self.receipt_poll_interval_ms.max(1)).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingCapability {
    Read { endpoint: String },
    Signer { account: Address },
}

/// The contract bound to one chain and one capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractBinding {
    pub chain_name: String,
    pub chain_id: ChainId,
    pub address: Address,
    pub capability: BindingCapability,
    /// Session binding generation this binding was derived from.
    pub generation: u64,
}

pub struct ContractGateway<W, S, R, N, C>
where
    W: WalletPort,
    S: StoragePort,
    R: RpcPort,
    N: NotifierPort,
    C: ClockPort,
{
    session: Arc<SessionManager<W, S>>,
    rpc: R,
    notifier: N,
    clock: C,
    options: GatewayOptions,
}

impl<W, S, R, N, C> ContractGateway<W, S, R, N, C>
where
    W: WalletPort,
    S: StoragePort,
    R: RpcPort,
    N: NotifierPort,
    C: ClockPort,
{
    pub fn new(
        session: Arc<SessionManager<W, S>>,
        rpc: R,
        notifier: N,
        clock: C,
        options: GatewayOptions,
    ) -> Self {
        Self {
            session,
            rpc,
            notifier,
            clock,
            options,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager<W, S>> {
        &self.session
    }

    pub fn read_binding(&self) -> Result<ContractBinding, WalletError> {
        read_binding(&self.session.snapshot()?, &self.session)
    }

    pub fn signer_binding(&self) -> Result<ContractBinding, WalletError> {
        signer_binding(&self.session.snapshot()?, &self.session)
    }

    /// Read-only call through the read provider.
    ///
    /// `Ok(None)` means the node answered but the call reverted or its result
    /// did not decode; callers treat that as "no data" rather than a failure.
    pub async fn query<Q: SolCall>(&self, call: &Q) -> Result<Option<Q::Return>, WalletError> {
        let binding = self.read_binding()?;
        let BindingCapability::Read { endpoint } = &binding.capability else {
            return Err(WalletError::Unexpected("read binding without endpoint".to_owned()));
        };
        let request = CallRequest {
            from: None,
            to: binding.address,
            data: call.abi_encode().into(),
            chain_id: None,
        };
        let params = json!([to_json(&request)?, "latest"]);

        let raw = match self.rpc.request(endpoint, ETH_CALL, params).await {
            Ok(value) => parse_bytes(&value)?,
            Err(e) => {
                let err = refine_revert(classify(&e));
                if let WalletError::ContractCallReverted(revert) = &err {
                    warn!(method = Q::SIGNATURE, %revert, "query reverted");
                    return Ok(None);
                }
                return Err(err);
            }
        };

        match Q::abi_decode_returns(&raw, true) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(e) => {
                warn!(method = Q::SIGNATURE, error = %e, "query result did not decode");
                Ok(None)
            }
        }
    }

    /// Simulates `call` from the connected account. Session state is never
    /// touched.
    pub async fn dry_run<Q: SolCall>(&self, call: &Q) -> DryRunResult {
        let snapshot = match self.session.snapshot() {
            Ok(s) => s,
            Err(e) => return DryRunResult::failed(e, 0),
        };
        let generation = snapshot.binding_generation;
        let binding = match signer_binding(&snapshot, &self.session) {
            Ok(b) => b,
            Err(e) => return DryRunResult::failed(e, generation),
        };
        let BindingCapability::Signer { account } = binding.capability else {
            return DryRunResult::failed(WalletError::WalletNotConnected, generation);
        };
        let request = CallRequest {
            from: Some(account),
            to: binding.address,
            data: call.abi_encode().into(),
            chain_id: None,
        };
        let params = match to_json(&request) {
            Ok(p) => json!([p, "latest"]),
            Err(e) => return DryRunResult::failed(e, generation),
        };

        match self.session.wallet().request(ETH_CALL, params).await {
            Ok(_) => {
                debug!(method = Q::SIGNATURE, generation, "dry run succeeded");
                DryRunResult::ok(generation)
            }
            Err(e) => {
                let err = refine_revert(classify(&e));
                debug!(method = Q::SIGNATURE, error = %err, "dry run failed");
                DryRunResult::failed(err, generation)
            }
        }
    }

    /// Sends a transaction and waits until it is mined.
    ///
    /// Every stage is reported to the notifier under the intent's correlation
    /// id, ending in exactly one success or error notification.
    pub async fn submit_and_confirm<Q: SolCall>(
        &self,
        intent: TxIntent<Q>,
    ) -> Result<TxResult, WalletError> {
        let id = intent.correlation_id.clone();
        self.notifier.show_loading(&id, MSG_TX_SENDING);

        match self.submit_inner(&intent).await {
            Ok(result) => {
                self.notifier
                    .show_success(&id, MSG_TX_SUCCESS, result.explorer_url.as_deref());
                info!(
                    %id,
                    hash = %result.hash,
                    block = ?result.block_number,
                    "transaction confirmed"
                );
                Ok(result)
            }
            Err(err) => {
                let message = match &err {
                    WalletError::UserRejected => {
                        info!(%id, "transaction cancelled by user");
                        MSG_TX_CANCELLED.to_owned()
                    }
                    other => {
                        warn!(%id, error = %other, "transaction failed");
                        other.user_message()
                    }
                };
                self.notifier.show_error(&id, &message);
                Err(err)
            }
        }
    }

    async fn submit_inner<Q: SolCall>(&self, intent: &TxIntent<Q>) -> Result<TxResult, WalletError> {
        let binding = self.signer_binding()?;
        let BindingCapability::Signer { account } = binding.capability else {
            return Err(WalletError::WalletNotConnected);
        };
        let request = CallRequest {
            from: Some(account),
            to: binding.address,
            data: intent.call.abi_encode().into(),
            chain_id: Some(chain_id_hex(binding.chain_id)),
        };
        let params = json!([to_json(&request)?]);

        let sent = self
            .session
            .wallet()
            .request(ETH_SEND_TRANSACTION, params)
            .await
            .map_err(|e| refine_revert(classify(&e)))?;
        let hash = parse_tx_hash(&sent)?;
        info!(%hash, method = Q::SIGNATURE, chain = %binding.chain_name, "transaction sent");
        self.notifier
            .show_loading(&intent.correlation_id, MSG_TX_PROCESSING);

        let receipt = self.wait_for_receipt(hash).await?;
        if !receipt.succeeded() {
            return Err(WalletError::ContractCallReverted(ContractRevert::reason(
                "transaction reverted on-chain",
            )));
        }

        let explorer_url = self
            .session
            .registry()
            .by_name(&binding.chain_name)
            .and_then(|n| n.explorer_tx_url(&hash));
        let participation = decode_participation(&receipt, binding.address);
        if participation.is_none() {
            debug!(%hash, "receipt carries no participation event");
        }

        Ok(TxResult {
            hash,
            block_number: receipt.block_number(),
            explorer_url,
            participation,
        })
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<ReceiptView, WalletError> {
        let polls = self.options.max_receipt_polls();
        for attempt in 0..polls {
            let value = self
                .session
                .wallet()
                .request(ETH_GET_TRANSACTION_RECEIPT, json!([hash]))
                .await?;
            if !value.is_null() {
                return serde_json::from_value(value).map_err(|e| {
                    WalletError::Unexpected(format!("malformed receipt for {hash}: {e}"))
                });
            }
            debug!(%hash, attempt, "receipt not available yet");
            if attempt + 1 < polls {
                self.clock
                    .sleep_ms(self.options.receipt_poll_interval_ms)
                    .await;
            }
        }
        Err(WalletError::ConfirmationTimeout(hash.to_string()))
    }
}

fn deployment<W: WalletPort, S: StoragePort>(
    session: &Session,
    manager: &SessionManager<W, S>,
) -> Result<(String, ChainId, Address), WalletError> {
    let name = match &session.active_chain {
        ActiveChain::Resolved(name) => name,
        ActiveChain::Unresolved(id) => return Err(WalletError::ChainUnresolved(*id)),
    };
    let descriptor = manager
        .registry()
        .by_name(name)
        .ok_or_else(|| WalletError::UnknownNetwork(name.clone()))?;
    let address = descriptor
        .contract_address
        .ok_or_else(|| WalletError::NoContractDeployment(descriptor.chain_name.clone()))?;
    Ok((descriptor.name.clone(), descriptor.chain_id, address))
}

fn read_binding<W: WalletPort, S: StoragePort>(
    session: &Session,
    manager: &SessionManager<W, S>,
) -> Result<ContractBinding, WalletError> {
    let (chain_name, chain_id, address) = deployment(session, manager)?;
    let endpoint = session
        .read_provider
        .as_ref()
        .filter(|r| r.chain_id == chain_id)
        .map(|r| r.endpoint.clone())
        .ok_or_else(|| WalletError::Unexpected(format!("no read endpoint for {chain_name}")))?;
    Ok(ContractBinding {
        chain_name,
        chain_id,
        address,
        capability: BindingCapability::Read { endpoint },
        generation: session.binding_generation,
    })
}

fn signer_binding<W: WalletPort, S: StoragePort>(
    session: &Session,
    manager: &SessionManager<W, S>,
) -> Result<ContractBinding, WalletError> {
    if session.provider.is_none() {
        return Err(WalletError::ProviderNotInitialized);
    }
    let signer = session.signer.ok_or(WalletError::WalletNotConnected)?;
    if session.provider.map(|p| p.generation) != Some(signer.provider_generation) {
        return Err(WalletError::WalletNotConnected);
    }
    let (chain_name, chain_id, address) = deployment(session, manager)?;
    Ok(ContractBinding {
        chain_name,
        chain_id,
        address,
        capability: BindingCapability::Signer {
            account: signer.account,
        },
        generation: session.binding_generation,
    })
}

fn to_json(request: &CallRequest) -> Result<serde_json::Value, WalletError> {
    serde_json::to_value(request)
        .map_err(|e| PortError::Validation(format!("serialize call request: {e}")).into())
}
