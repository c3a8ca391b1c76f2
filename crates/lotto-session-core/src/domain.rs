use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::state_machine::SessionState;

pub type ChainId = u64;

/// Ties the stages of one async operation to one progress indicator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_clock(prefix: &str, now_ms: u64) -> Self {
        Self(format!("{prefix}-{now_ms}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEventKind {
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub sequence: u64,
    pub kind: ProviderEventKind,
}

/// The application's belief about which chain is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveChain {
    Resolved(String),
    /// Wallet moved to a chain the registry does not know; no contract calls
    /// are issued until this resolves.
    Unresolved(ChainId),
}

impl ActiveChain {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Resolved(name) => Some(name),
            Self::Unresolved(_) => None,
        }
    }
}

/// Handle on the current wallet provider. Re-initialization yields a new
/// generation instead of mutating the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHandle {
    pub generation: u64,
}

/// "Can sign for account X" through a given provider generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerCapability {
    pub account: Address,
    pub provider_generation: u64,
}

/// RPC endpoint for reads that do not need wallet authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadProvider {
    pub chain_name: String,
    pub chain_id: ChainId,
    pub endpoint: String,
}

/// Snapshot of the live connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub state: SessionState,
    pub provider: Option<ProviderHandle>,
    pub signer: Option<SignerCapability>,
    pub account: Option<Address>,
    pub active_chain: ActiveChain,
    pub read_provider: Option<ReadProvider>,
    pub last_error: Option<WalletError>,
    /// Bumped whenever provider, signer account or active chain change;
    /// contract bindings built for an older generation are stale.
    pub binding_generation: u64,
    /// Ticket of the most recently started reconciliation or disconnect.
    pub reconcile_epoch: u64,
    /// Held for the whole `connect` call, even when a wallet event moves
    /// `state` out of `Connecting` meanwhile.
    pub connect_pending: bool,
}

impl Session {
    pub fn new(default_chain: impl Into<String>) -> Self {
        Self {
            state: SessionState::Uninitialized,
            provider: None,
            signer: None,
            account: None,
            active_chain: ActiveChain::Resolved(default_chain.into()),
            read_provider: None,
            last_error: None,
            binding_generation: 0,
            reconcile_epoch: 0,
            connect_pending: false,
        }
    }

    pub fn is_connecting(&self) -> bool {
        self.connect_pending || self.state == SessionState::Connecting
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.account.is_some()
    }

    pub fn active_chain_name(&self) -> Option<&str> {
        self.active_chain.name()
    }
}

/// What to call and which progress indicator it reports to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIntent<C> {
    pub call: C,
    pub correlation_id: CorrelationId,
}

impl<C> TxIntent<C> {
    pub fn new(call: C, correlation_id: CorrelationId) -> Self {
        Self {
            call,
            correlation_id,
        }
    }
}

/// Outcome of a static (non-mutating) call. Never carries a hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunResult {
    pub success: bool,
    pub error: Option<WalletError>,
    /// Binding generation the call ran against.
    pub generation: u64,
}

impl DryRunResult {
    pub fn ok(generation: u64) -> Self {
        Self {
            success: true,
            error: None,
            generation,
        }
    }

    pub fn failed(error: WalletError, generation: u64) -> Self {
        Self {
            success: false,
            error: Some(error),
            generation,
        }
    }

    /// Custom error name or revert reason, e.g. `AlreadyParticipated`.
    pub fn classified_error(&self) -> Option<String> {
        match self.error.as_ref()? {
            WalletError::ContractCallReverted(revert) => Some(revert.label()),
            other => Some(other.to_string()),
        }
    }
}

/// Participation decoded from the confirmation receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationRecord {
    pub draw_id: u64,
    pub ticket_id: u64,
    pub participant: Address,
    pub numbers: Vec<u8>,
}

/// Confirmed submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub hash: B256,
    pub block_number: Option<u64>,
    pub explorer_url: Option<String>,
    pub participation: Option<ParticipationRecord>,
}

/// Result of draining and applying queued wallet events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecoverySummary {
    pub drained_events: usize,
    pub accounts_changed: bool,
    pub chain_changed: bool,
    pub latest_chain_id: Option<ChainId>,
    pub latest_account_count: usize,
    pub chain_unresolved: bool,
}

/// `0x1234...5678` for display.
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
