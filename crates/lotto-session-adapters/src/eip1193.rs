use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use lotto_session_core::wire::{
    accounts_to_json, chain_id_hex, json_chain_id, parse_accounts, ETH_ACCOUNTS, ETH_CALL,
    ETH_CHAIN_ID, ETH_GET_TRANSACTION_RECEIPT, ETH_REQUEST_ACCOUNTS, ETH_SEND_TRANSACTION,
    WALLET_ADD_CHAIN, WALLET_SWITCH_CHAIN,
};
use lotto_session_core::{PortError, ProviderEvent, ProviderEventKind, WalletPort};

use crate::ClientConfig;

const UNSUPPORTED_METHOD_CODE: i64 = 4200;

#[derive(Debug, Clone)]
pub struct Eip1193Adapter {
    mode: ProviderMode,
    state: Arc<Mutex<ProviderState>>,
    #[cfg(target_arch = "wasm32")]
    hooks: Arc<Mutex<BrowserHooks>>,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Disabled(String),
    Deterministic,
    #[cfg(not(target_arch = "wasm32"))]
    Proxy(ProxyRuntime),
    #[cfg(target_arch = "wasm32")]
    Browser,
}

#[derive(Debug, Clone)]
#[cfg(not(target_arch = "wasm32"))]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone)]
struct ProviderState {
    /// Accounts this origin is authorized for.
    accounts: Vec<Address>,
    /// Accounts the deterministic wallet grants on `eth_requestAccounts`.
    grantable: Vec<Address>,
    chain_id: u64,
    known_chains: Vec<u64>,
    sent: Vec<B256>,
    subscribed: bool,
    event_seq: u64,
    events: Vec<ProviderEvent>,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            grantable: vec![Address::with_last_byte(1)],
            chain_id: 0x79a,
            known_chains: vec![0x79a],
            sent: Vec::new(),
            subscribed: false,
            event_seq: 0,
            events: Vec::new(),
        }
    }
}

impl ProviderState {
    fn push_event(&mut self, kind: ProviderEventKind) {
        self.event_seq = self.event_seq.saturating_add(1);
        let sequence = self.event_seq;
        self.events.push(ProviderEvent { sequence, kind });
    }
}

#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
struct BrowserHooks {
    accounts_changed: Option<wasm_bindgen::closure::Closure<dyn FnMut(wasm_bindgen::JsValue)>>,
    chain_changed: Option<wasm_bindgen::closure::Closure<dyn FnMut(wasm_bindgen::JsValue)>>,
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::with_config(ClientConfig::default())
    }
}

impl Eip1193Adapter {
    pub fn with_config(config: ClientConfig) -> Self {
        #[cfg(target_arch = "wasm32")]
        let mode = if browser_provider_available() {
            ProviderMode::Browser
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 browser provider not found in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };

        #[cfg(not(target_arch = "wasm32"))]
        let mode = if let Some(ref base_url) = config.eip1193_proxy_url {
            let timeout = std::time::Duration::from_millis(config.rpc_timeout_ms);
            match reqwest::Client::builder().timeout(timeout).build() {
                Ok(client) => ProviderMode::Proxy(ProxyRuntime {
                    base_url: base_url.clone(),
                    client,
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        ProviderMode::Disabled(format!(
                            "failed to initialize EIP-1193 proxy client in production profile: {e}"
                        ))
                    } else {
                        warn!(error = %e, "EIP-1193 proxy unavailable, using deterministic wallet");
                        ProviderMode::Deterministic
                    }
                }
            }
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 proxy URL not configured in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };

        debug!(mode = mode.label(), "EIP-1193 adapter created");
        Self {
            mode,
            state: Arc::new(Mutex::new(ProviderState::default())),
            #[cfg(target_arch = "wasm32")]
            hooks: Arc::new(Mutex::new(BrowserHooks::default())),
        }
    }

    pub fn mode_label(&self) -> &'static str {
        self.mode.label()
    }

    fn check_mode(&self) -> Result<(), PortError> {
        if let ProviderMode::Disabled(reason) = &self.mode {
            return Err(PortError::Policy(reason.clone()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ProviderState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))
    }

    /// Simulates the user switching accounts in the extension.
    pub fn debug_inject_accounts_changed(&self, accounts: Vec<Address>) -> Result<(), PortError> {
        let mut g = self.lock()?;
        g.accounts = accounts.clone();
        g.push_event(ProviderEventKind::AccountsChanged(accounts));
        Ok(())
    }

    /// Simulates the user switching chains in the extension.
    pub fn debug_inject_chain_changed(&self, chain_id: u64) -> Result<(), PortError> {
        let mut g = self.lock()?;
        g.chain_id = chain_id;
        if !g.known_chains.contains(&chain_id) {
            g.known_chains.push(chain_id);
        }
        g.push_event(ProviderEventKind::ChainChanged(chain_id));
        Ok(())
    }

    /// Accounts the deterministic wallet authorizes on the next connect.
    pub fn debug_set_grantable(&self, accounts: Vec<Address>) -> Result<(), PortError> {
        self.lock()?.grantable = accounts;
        Ok(())
    }

    fn deterministic_request(&self, method: &str, params: &Value) -> Result<Value, PortError> {
        let mut g = self.lock()?;
        match method {
            ETH_ACCOUNTS => Ok(accounts_to_json(&g.accounts)),
            ETH_REQUEST_ACCOUNTS => {
                if g.accounts.is_empty() {
                    let granted = g.grantable.clone();
                    g.accounts = granted.clone();
                    g.push_event(ProviderEventKind::AccountsChanged(granted));
                }
                Ok(accounts_to_json(&g.accounts))
            }
            ETH_CHAIN_ID => Ok(json!(chain_id_hex(g.chain_id))),
            WALLET_SWITCH_CHAIN => {
                let target = json_chain_id(&params[0]["chainId"])?;
                if !g.known_chains.contains(&target) {
                    return Err(PortError::rpc(
                        4902,
                        format!("Unrecognized chain ID {}", chain_id_hex(target)),
                    ));
                }
                if g.chain_id != target {
                    g.chain_id = target;
                    g.push_event(ProviderEventKind::ChainChanged(target));
                }
                Ok(Value::Null)
            }
            WALLET_ADD_CHAIN => {
                let target = json_chain_id(&params[0]["chainId"])?;
                if !g.known_chains.contains(&target) {
                    g.known_chains.push(target);
                }
                Ok(Value::Null)
            }
            ETH_CALL => Ok(json!("0x")),
            ETH_SEND_TRANSACTION => {
                let canonical = serde_json::to_vec(params).map_err(|e| {
                    PortError::Validation(format!("tx payload serialization failed: {e}"))
                })?;
                let hash = keccak256(canonical);
                g.sent.push(hash);
                Ok(json!(hash))
            }
            ETH_GET_TRANSACTION_RECEIPT => {
                let hash: B256 = params[0]
                    .as_str()
                    .ok_or_else(|| PortError::Validation("receipt hash must be string".to_owned()))?
                    .parse()
                    .map_err(|e| PortError::Validation(format!("invalid tx hash: {e}")))?;
                if !g.sent.contains(&hash) {
                    return Ok(Value::Null);
                }
                Ok(json!({
                    "transactionHash": hash,
                    "blockNumber": "0x1",
                    "status": "0x1",
                    "logs": [],
                }))
            }
            other => Err(PortError::rpc(
                UNSUPPORTED_METHOD_CODE,
                format!("method {other} not supported by deterministic wallet"),
            )),
        }
    }

    /// Records account/chain changes observed through request results, so
    /// runtimes without push events still feed the event queue.
    fn observe(&self, method: &str, result: &Value) -> Result<(), PortError> {
        match method {
            ETH_ACCOUNTS | ETH_REQUEST_ACCOUNTS => {
                let accounts = parse_accounts(result)?;
                let mut g = self.lock()?;
                if g.accounts != accounts {
                    g.accounts = accounts.clone();
                    g.push_event(ProviderEventKind::AccountsChanged(accounts));
                }
            }
            ETH_CHAIN_ID => {
                let chain_id = json_chain_id(result)?;
                let mut g = self.lock()?;
                if g.chain_id != chain_id {
                    g.chain_id = chain_id;
                    g.push_event(ProviderEventKind::ChainChanged(chain_id));
                }
            }
            _ => {}
        }
        Ok(())
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn proxy_call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let proxy = match &self.mode {
            ProviderMode::Proxy(proxy) => proxy,
            ProviderMode::Disabled(reason) => return Err(PortError::Policy(reason.clone())),
            _ => {
                return Err(PortError::NotImplemented(
                    "eip1193 proxy runtime not enabled",
                ))
            }
        };

        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = proxy
            .client
            .post(&proxy.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy json decode failed: {e}")))?;
        if let Some(err) = body.get("error") {
            return Err(PortError::from_rpc_object(err));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "eip1193 proxy status {status}: {body}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("eip1193 proxy missing result".to_owned()))
    }

    #[cfg(target_arch = "wasm32")]
    async fn wasm_request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        use wasm_bindgen::JsCast;

        let provider = browser_provider()?;
        let request_fn = get_prop(&provider, "request")
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            .ok_or(PortError::NotImplemented(
                "window.ethereum.request is unavailable",
            ))?;

        let request = json!({
            "method": method,
            "params": params,
        });
        let request_js = serde_wasm_bindgen::to_value(&request)
            .map_err(|e| PortError::Transport(format!("failed to encode wasm request: {e}")))?;
        let promise_js = request_fn.call1(&provider, &request_js).map_err(|e| {
            PortError::Transport(format!("provider request dispatch failed: {e:?}"))
        })?;
        let promise = promise_js.dyn_into::<js_sys::Promise>().map_err(|_| {
            PortError::Transport("provider request did not return Promise".to_owned())
        })?;
        let result_js = wasm_bindgen_futures::JsFuture::from(promise)
            .await
            .map_err(js_rejection_to_port_error)?;
        if result_js.is_undefined() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(result_js)
            .map_err(|e| PortError::Transport(format!("failed to decode wasm response: {e}")))
    }

    #[cfg(target_arch = "wasm32")]
    fn register_browser_hooks(&self) -> Result<(), PortError> {
        use wasm_bindgen::{closure::Closure, JsCast, JsValue};

        let provider = browser_provider()?;
        let on_fn = get_prop(&provider, "on")
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            .or_else(|| {
                get_prop(&provider, "addListener")
                    .ok()
                    .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            })
            .ok_or(PortError::NotImplemented(
                "provider does not expose on/addListener",
            ))?;

        let mut hooks = self
            .hooks
            .lock()
            .map_err(|e| PortError::Transport(format!("provider hooks lock poisoned: {e}")))?;
        if hooks.accounts_changed.is_some() && hooks.chain_changed.is_some() {
            return Ok(());
        }

        let state_for_accounts = Arc::clone(&self.state);
        let accounts_cb = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            let mut accounts = Vec::new();
            if js_sys::Array::is_array(&value) {
                for item in js_sys::Array::from(&value).iter() {
                    if let Some(addr) = item.as_string().and_then(|raw| raw.parse().ok()) {
                        accounts.push(addr);
                    }
                }
            }
            if let Ok(mut g) = state_for_accounts.lock() {
                g.accounts = accounts.clone();
                g.push_event(ProviderEventKind::AccountsChanged(accounts));
            }
        });

        let state_for_chain = Arc::clone(&self.state);
        let chain_cb = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            if let Ok(chain_id) = js_chain_id_to_u64(value) {
                if let Ok(mut g) = state_for_chain.lock() {
                    g.chain_id = chain_id;
                    g.push_event(ProviderEventKind::ChainChanged(chain_id));
                }
            }
        });

        on_fn
            .call2(
                &provider,
                &JsValue::from_str("accountsChanged"),
                accounts_cb.as_ref().unchecked_ref(),
            )
            .map_err(|e| PortError::Transport(format!("register accountsChanged failed: {e:?}")))?;
        on_fn
            .call2(
                &provider,
                &JsValue::from_str("chainChanged"),
                chain_cb.as_ref().unchecked_ref(),
            )
            .map_err(|e| PortError::Transport(format!("register chainChanged failed: {e:?}")))?;

        hooks.accounts_changed = Some(accounts_cb);
        hooks.chain_changed = Some(chain_cb);
        Ok(())
    }

    #[cfg(target_arch = "wasm32")]
    fn unregister_browser_hooks(&self) -> Result<(), PortError> {
        use wasm_bindgen::{JsCast, JsValue};

        let provider = browser_provider()?;
        let remove_fn = get_prop(&provider, "removeListener")
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            .ok_or(PortError::NotImplemented(
                "provider does not expose removeListener",
            ))?;

        let mut hooks = self
            .hooks
            .lock()
            .map_err(|e| PortError::Transport(format!("provider hooks lock poisoned: {e}")))?;
        if let Some(cb) = hooks.accounts_changed.take() {
            remove_fn
                .call2(
                    &provider,
                    &JsValue::from_str("accountsChanged"),
                    cb.as_ref().unchecked_ref(),
                )
                .map_err(|e| {
                    PortError::Transport(format!("remove accountsChanged failed: {e:?}"))
                })?;
        }
        if let Some(cb) = hooks.chain_changed.take() {
            remove_fn
                .call2(
                    &provider,
                    &JsValue::from_str("chainChanged"),
                    cb.as_ref().unchecked_ref(),
                )
                .map_err(|e| PortError::Transport(format!("remove chainChanged failed: {e:?}")))?;
        }
        Ok(())
    }
}

impl ProviderMode {
    fn label(&self) -> &'static str {
        match self {
            Self::Disabled(_) => "disabled",
            Self::Deterministic => "deterministic",
            #[cfg(not(target_arch = "wasm32"))]
            Self::Proxy(_) => "proxy",
            #[cfg(target_arch = "wasm32")]
            Self::Browser => "browser",
        }
    }
}

#[async_trait(?Send)]
impl WalletPort for Eip1193Adapter {
    fn is_available(&self) -> bool {
        !matches!(self.mode, ProviderMode::Disabled(_))
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        self.check_mode()?;

        #[cfg(not(target_arch = "wasm32"))]
        if matches!(self.mode, ProviderMode::Proxy(_)) {
            let result = self.proxy_call(method, params).await?;
            self.observe(method, &result)?;
            return Ok(result);
        }

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            let result = self.wasm_request(method, params).await?;
            self.observe(method, &result)?;
            return Ok(result);
        }

        self.deterministic_request(method, &params)
    }

    fn subscribe(&self) -> Result<(), PortError> {
        self.check_mode()?;

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            self.register_browser_hooks()?;
        }

        self.lock()?.subscribed = true;
        Ok(())
    }

    fn unsubscribe(&self) -> Result<(), PortError> {
        self.check_mode()?;

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            self.unregister_browser_hooks()?;
        }

        self.lock()?.subscribed = false;
        Ok(())
    }

    fn drain_events(&self) -> Result<Vec<ProviderEvent>, PortError> {
        self.check_mode()?;
        Ok(std::mem::take(&mut self.lock()?.events))
    }
}

#[cfg(target_arch = "wasm32")]
fn browser_provider_available() -> bool {
    browser_provider().is_ok()
}

#[cfg(target_arch = "wasm32")]
fn browser_provider() -> Result<wasm_bindgen::JsValue, PortError> {
    let window =
        web_sys::window().ok_or_else(|| PortError::Transport("missing window".to_owned()))?;
    let provider = get_prop(&window.into(), "ethereum")?;
    if provider.is_null() || provider.is_undefined() {
        return Err(PortError::NotFound("window.ethereum missing".to_owned()));
    }
    Ok(provider)
}

#[cfg(target_arch = "wasm32")]
fn get_prop(target: &wasm_bindgen::JsValue, key: &str) -> Result<wasm_bindgen::JsValue, PortError> {
    js_sys::Reflect::get(target, &wasm_bindgen::JsValue::from_str(key))
        .map_err(|e| PortError::Transport(format!("read provider property {key} failed: {e:?}")))
}

/// Wallets reject with `{code, message, data}` objects; keep them structured.
#[cfg(target_arch = "wasm32")]
fn js_rejection_to_port_error(err: wasm_bindgen::JsValue) -> PortError {
    match serde_wasm_bindgen::from_value::<Value>(err.clone()) {
        Ok(obj) if obj.get("code").is_some() || obj.get("message").is_some() => {
            PortError::from_rpc_object(&obj)
        }
        _ => PortError::Transport(format!("provider request rejected: {err:?}")),
    }
}

#[cfg(target_arch = "wasm32")]
fn js_chain_id_to_u64(value: wasm_bindgen::JsValue) -> Result<u64, PortError> {
    if let Some(s) = value.as_string() {
        return lotto_session_core::wire::parse_chain_id(&s);
    }
    if let Some(num) = value.as_f64() {
        return Ok(num as u64);
    }
    Err(PortError::Validation("invalid JS chain id".to_owned()))
}
