//! JSON shapes exchanged with EIP-1193 providers and JSON-RPC nodes.

use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ChainId;
use crate::ports::PortError;

pub const ETH_ACCOUNTS: &str = "eth_accounts";
pub const ETH_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
pub const ETH_CHAIN_ID: &str = "eth_chainId";
pub const ETH_CALL: &str = "eth_call";
pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const ETH_GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
pub const WALLET_SWITCH_CHAIN: &str = "wallet_switchEthereumChain";
pub const WALLET_ADD_CHAIN: &str = "wallet_addEthereumChain";

pub fn parse_accounts(value: &Value) -> Result<Vec<Address>, PortError> {
    let arr = value
        .as_array()
        .ok_or_else(|| PortError::Transport("accounts result must be array".to_owned()))?;
    arr.iter()
        .map(|item| {
            let raw = item
                .as_str()
                .ok_or_else(|| PortError::Transport("account must be string".to_owned()))?;
            raw.parse()
                .map_err(|e| PortError::Validation(format!("invalid account address: {e}")))
        })
        .collect()
}

pub fn accounts_to_json(accounts: &[Address]) -> Value {
    Value::Array(
        accounts
            .iter()
            .map(|a| Value::String(a.to_string()))
            .collect(),
    )
}

pub fn json_chain_id(value: &Value) -> Result<ChainId, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| PortError::Validation("chain id must be string or number".to_owned()))?;
    parse_chain_id(s)
}

/// Accepts `0x`-prefixed hex in either case, or decimal.
pub fn parse_chain_id(raw: &str) -> Result<ChainId, PortError> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| PortError::Validation(format!("invalid hex chain id {raw}: {e}")))
    } else {
        raw.parse()
            .map_err(|e| PortError::Validation(format!("invalid chain id {raw}: {e}")))
    }
}

pub fn chain_id_hex(chain_id: ChainId) -> String {
    format!("{chain_id:#x}")
}

/// Case-insensitive comparison of two chain id strings.
pub fn chain_ids_match(a: &str, b: &str) -> bool {
    match (parse_chain_id(a), parse_chain_id(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => a.eq_ignore_ascii_case(b),
    }
}

pub fn parse_tx_hash(value: &Value) -> Result<B256, PortError> {
    let raw = value
        .as_str()
        .ok_or_else(|| PortError::Transport("transaction hash must be string".to_owned()))?;
    raw.parse()
        .map_err(|e| PortError::Validation(format!("invalid tx hash: {e}")))
}

pub fn parse_bytes(value: &Value) -> Result<Bytes, PortError> {
    let raw = value
        .as_str()
        .ok_or_else(|| PortError::Transport("call result must be hex string".to_owned()))?;
    raw.parse()
        .map_err(|e| PortError::Validation(format!("invalid call result hex: {e}")))
}

fn parse_quantity(raw: &str) -> Option<u64> {
    parse_chain_id(raw).ok()
}

/// Transaction populated for `eth_call` / `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptView {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl ReceiptView {
    pub fn block_number(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(parse_quantity)
    }

    /// Pre-Byzantium receipts have no status; treat them as successful.
    pub fn succeeded(&self) -> bool {
        self.status
            .as_deref()
            .and_then(parse_quantity)
            .map(|s| s == 1)
            .unwrap_or(true)
    }
}
