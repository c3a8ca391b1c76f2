use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{CorrelationId, ProviderEvent};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("policy error: {0}")]
    Policy(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// Error object returned by a provider `request()` (EIP-1193 / EIP-1474).
    #[error("provider rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
}

impl PortError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn rpc_with_data(code: i64, message: impl Into<String>, data: Value) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Parses a JSON-RPC `error` member into a `PortError::Rpc`.
    pub fn from_rpc_object(value: &Value) -> Self {
        let code = value.get("code").and_then(Value::as_i64).unwrap_or(-32603);
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown provider error")
            .to_owned();
        Self::Rpc {
            code,
            message,
            data: value.get("data").cloned(),
        }
    }
}

/// The injected wallet extension (`window.ethereum`).
///
/// `request` may prompt the user depending on the method; `eth_accounts` and
/// `eth_chainId` never do. Events observed after `subscribe` are queued and
/// handed out by `drain_events` in arrival order.
#[async_trait(?Send)]
pub trait WalletPort {
    fn is_available(&self) -> bool;
    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError>;
    fn subscribe(&self) -> Result<(), PortError>;
    fn unsubscribe(&self) -> Result<(), PortError>;
    fn drain_events(&self) -> Result<Vec<ProviderEvent>, PortError>;
}

/// Plain JSON-RPC endpoint used for reads that must work without a wallet.
#[async_trait(?Send)]
pub trait RpcPort {
    async fn request(&self, endpoint: &str, method: &str, params: Value)
        -> Result<Value, PortError>;
}

pub trait StoragePort {
    fn get(&self, key: &str) -> Result<Option<String>, PortError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PortError>;
    fn remove(&self, key: &str) -> Result<(), PortError>;

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PortError>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| PortError::Validation(format!("stored value for {key}: {e}"))),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), PortError>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value)
            .map_err(|e| PortError::Validation(format!("serialize {key}: {e}")))?;
        self.set(key, &raw)
    }
}

/// User-visible progress indicator, keyed by correlation id.
pub trait NotifierPort {
    fn show_loading(&self, id: &CorrelationId, message: &str);
    fn show_success(&self, id: &CorrelationId, message: &str, explorer_url: Option<&str>);
    fn show_error(&self, id: &CorrelationId, message: &str);
}

#[async_trait(?Send)]
pub trait ClockPort {
    fn now_ms(&self) -> Result<u64, PortError>;
    async fn sleep_ms(&self, ms: u64);
}
