//! Classified wallet/contract failures.
//!
//! Wallet extensions and RPC nodes report failures as loosely shaped error
//! objects. [`classify`] is the single place that inspects those shapes; the
//! rest of the crate only matches on [`WalletError`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::ChainId;
use crate::ports::PortError;

pub const USER_REJECTED_CODE: i64 = 4001;
pub const UNAUTHORIZED_CODE: i64 = 4100;
pub const CHAIN_UNKNOWN_CODE: i64 = 4902;
pub const REQUEST_PENDING_CODE: i64 = -32002;
pub const EXECUTION_REVERTED_CODE: i64 = 3;

/// Revert information decoded as far as the ABI allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRevert {
    /// Custom error name, e.g. `AlreadyParticipated`.
    pub name: Option<String>,
    pub args: Vec<String>,
    /// `Error(string)` / `Panic(uint256)` text or the node's message.
    pub reason: Option<String>,
    /// Raw revert data when it could not be decoded.
    pub data: Option<String>,
}

impl ContractRevert {
    pub fn custom(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: Some(name.into()),
            args,
            reason: None,
            data: None,
        }
    }

    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            name: None,
            args: Vec::new(),
            reason: Some(reason.into()),
            data: None,
        }
    }

    /// Short label used as the dry-run `classifiedError`.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.reason.clone())
            .unwrap_or_else(|| "execution reverted".to_owned())
    }
}

impl std::fmt::Display for ContractRevert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.name, &self.reason) {
            (Some(name), _) if self.args.is_empty() => write!(f, "{name}"),
            (Some(name), _) => write!(f, "{name}({})", self.args.join(", ")),
            (None, Some(reason)) => write!(f, "{reason}"),
            (None, None) => write!(f, "execution reverted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum WalletError {
    #[error("no injected wallet detected")]
    NoWalletDetected,
    #[error("request rejected by user")]
    UserRejected,
    #[error("a wallet request is already pending")]
    RequestAlreadyPending,
    #[error("chain {0:#x} is unknown to the wallet")]
    ChainUnknownToWallet(ChainId),
    #[error("wallet is on chain {actual:#x} after switching to {expected:#x}")]
    ChainMismatchAfterSwitch { expected: ChainId, actual: ChainId },
    #[error("contract call reverted: {0}")]
    ContractCallReverted(ContractRevert),
    #[error("wallet provider not initialized")]
    ProviderNotInitialized,
    #[error("wallet not connected")]
    WalletNotConnected,
    #[error("a connect request is already in progress")]
    ConnectInProgress,
    #[error("active chain {0:#x} is not a supported network")]
    ChainUnresolved(ChainId),
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    #[error("no lottery contract deployed on {0}")]
    NoContractDeployment(String),
    #[error("transaction {0} was not confirmed in time")]
    ConfirmationTimeout(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl WalletError {
    /// Message suitable for a toast; never exposes raw provider payloads.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoWalletDetected => {
                "No Ethereum wallet detected. Install or enable a browser wallet.".to_owned()
            }
            Self::UserRejected => "Request cancelled in wallet".to_owned(),
            Self::RequestAlreadyPending => {
                "A wallet request is already pending, check your wallet".to_owned()
            }
            Self::ChainUnknownToWallet(_) => "Network is not configured in wallet".to_owned(),
            Self::ChainMismatchAfterSwitch { .. } => {
                "Wallet did not switch to the requested network".to_owned()
            }
            Self::ContractCallReverted(revert) => format!("Transaction rejected: {revert}"),
            Self::ProviderNotInitialized | Self::WalletNotConnected => {
                "Wallet not connected".to_owned()
            }
            Self::ConnectInProgress => "Connection already in progress".to_owned(),
            Self::ChainUnresolved(_) => "Unsupported network selected in wallet".to_owned(),
            Self::UnknownNetwork(name) => format!("Unknown network: {name}"),
            Self::NoContractDeployment(name) => format!("Lottery is not available on {name}"),
            Self::ConfirmationTimeout(_) => {
                "Transaction is taking longer than expected to confirm".to_owned()
            }
            Self::Unexpected(_) => "Error while processing request".to_owned(),
        }
    }

    /// Rejections and pending prompts end an operation without being failures.
    pub fn is_prompt_outcome(&self) -> bool {
        matches!(self, Self::UserRejected | Self::RequestAlreadyPending)
    }
}

impl From<PortError> for WalletError {
    fn from(err: PortError) -> Self {
        classify(&err)
    }
}

/// Maps a raw port failure onto the error taxonomy.
///
/// Revert data is left undecoded here (`data` holds the hex payload); the
/// contract gateway owns the ABI and decodes it further.
pub fn classify(err: &PortError) -> WalletError {
    match err {
        PortError::Rpc {
            code,
            message,
            data,
        } => classify_rpc(*code, message, data.as_ref()),
        PortError::NotFound(what) if what.contains("ethereum") => WalletError::NoWalletDetected,
        other => WalletError::Unexpected(other.to_string()),
    }
}

fn classify_rpc(code: i64, message: &str, data: Option<&Value>) -> WalletError {
    let nested = data
        .and_then(|d| d.get("originalError"))
        .and_then(|o| o.get("code"))
        .and_then(Value::as_i64);

    match (code, nested) {
        (USER_REJECTED_CODE, _) | (_, Some(USER_REJECTED_CODE)) => WalletError::UserRejected,
        (REQUEST_PENDING_CODE, _) => WalletError::RequestAlreadyPending,
        (CHAIN_UNKNOWN_CODE, _) | (_, Some(CHAIN_UNKNOWN_CODE)) => {
            WalletError::ChainUnknownToWallet(0)
        }
        (UNAUTHORIZED_CODE, _) => WalletError::WalletNotConnected,
        _ => {
            if let Some(revert_data) = revert_data(code, message, data) {
                return WalletError::ContractCallReverted(ContractRevert {
                    name: None,
                    args: Vec::new(),
                    reason: Some(message.to_owned()),
                    data: Some(revert_data),
                });
            }
            if is_revert_message(message) {
                return WalletError::ContractCallReverted(ContractRevert::reason(message));
            }
            if is_rejection_message(message) {
                return WalletError::UserRejected;
            }
            WalletError::Unexpected(format!("rpc error {code}: {message}"))
        }
    }
}

/// Extracts the hex revert payload from the error shapes wallets and nodes use:
/// `data: "0x..."`, `data: {data: "0x..."}` and `data: {originalError: {data}}`.
fn revert_data(code: i64, message: &str, data: Option<&Value>) -> Option<String> {
    let data = data?;
    let candidate = data
        .as_str()
        .or_else(|| data.get("data").and_then(Value::as_str))
        .or_else(|| {
            data.get("originalError")
                .and_then(|o| o.get("data"))
                .and_then(Value::as_str)
        })?;
    let looks_like_revert = code == EXECUTION_REVERTED_CODE || is_revert_message(message);
    (candidate.starts_with("0x") && (looks_like_revert || candidate.len() >= 10))
        .then(|| candidate.to_owned())
}

fn is_revert_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("execution reverted") || lower.contains("revert")
}

fn is_rejection_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("user rejected") || lower.contains("user denied")
}
