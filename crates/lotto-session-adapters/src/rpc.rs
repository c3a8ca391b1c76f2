use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use lotto_session_core::{PortError, RpcPort};

use crate::ClientConfig;

/// JSON-RPC over HTTP for wallet-independent reads.
#[derive(Debug)]
pub struct HttpRpcAdapter {
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl Default for HttpRpcAdapter {
    fn default() -> Self {
        Self::with_config(&ClientConfig::default())
    }
}

impl HttpRpcAdapter {
    pub fn with_config(config: &ClientConfig) -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.rpc_timeout_ms))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "rpc client builder failed, using defaults");
                reqwest::Client::new()
            });
        #[cfg(target_arch = "wasm32")]
        let client = {
            let _ = config;
            reqwest::Client::new()
        };
        Self {
            client,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait(?Send)]
impl RpcPort for HttpRpcAdapter {
    async fn request(
        &self,
        endpoint: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, PortError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(endpoint, method, id, "rpc request");

        let response = self
            .client
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("rpc request to {endpoint} failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("rpc json decode failed: {e}")))?;
        if let Some(err) = body.get("error") {
            return Err(PortError::from_rpc_object(err));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!("rpc status {status}: {body}")));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("rpc response missing result".to_owned()))
    }
}
