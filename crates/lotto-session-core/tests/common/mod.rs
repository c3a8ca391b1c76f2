#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{SolError, SolEvent};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use lotto_session_core::abi::LottoClient;
use lotto_session_core::networks::MINATO;
use lotto_session_core::wire::{
    accounts_to_json, chain_id_hex, json_chain_id, ETH_ACCOUNTS, ETH_CALL, ETH_CHAIN_ID,
    ETH_GET_TRANSACTION_RECEIPT, ETH_REQUEST_ACCOUNTS, ETH_SEND_TRANSACTION, WALLET_ADD_CHAIN,
    WALLET_SWITCH_CHAIN,
};
use lotto_session_core::{
    ClockPort, ContractGateway, CorrelationId, GatewayOptions, NetworkRegistry, NetworkSwitcher,
    NotifierPort, PortError, ProviderEvent, ProviderEventKind, RpcPort, SessionManager,
    SessionOptions, StoragePort, SwitchOptions, WalletPort,
};

pub const MINATO_ID: u64 = 0x79a;
pub const MOONBASE_ID: u64 = 0x507;
pub const SHIBUYA_ID: u64 = 0x51;

pub fn account_a() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn account_b() -> Address {
    Address::repeat_byte(0xbb)
}

pub fn tx_hash() -> B256 {
    B256::repeat_byte(0x5a)
}

pub fn minato_contract() -> Address {
    NetworkRegistry::builtin()
        .by_name(MINATO)
        .and_then(|n| n.contract_address)
        .expect("minato deployment")
}

#[derive(Debug)]
pub struct WalletScript {
    pub available: bool,
    /// Accounts this origin is authorized for (`eth_accounts`).
    pub authorized: Vec<Address>,
    /// Accounts the user approves on `eth_requestAccounts`.
    pub grantable: Vec<Address>,
    pub chain_id: u64,
    pub known_chains: Vec<u64>,
    /// When false the wallet acknowledges a switch but stays put.
    pub apply_switch: bool,
    pub overrides: HashMap<String, VecDeque<Result<Value, PortError>>>,
    pub calls: Vec<(String, Value)>,
    pub events: Vec<ProviderEvent>,
    pub next_sequence: u64,
    pub subscribed: bool,
}

impl Default for WalletScript {
    fn default() -> Self {
        Self {
            available: true,
            authorized: Vec::new(),
            grantable: vec![account_a()],
            chain_id: MINATO_ID,
            known_chains: vec![MINATO_ID],
            apply_switch: true,
            overrides: HashMap::new(),
            calls: Vec::new(),
            events: Vec::new(),
            next_sequence: 0,
            subscribed: false,
        }
    }
}

/// In-process wallet whose answers are scripted per test.
#[derive(Debug, Clone, Default)]
pub struct ScriptedWallet {
    script: Arc<Mutex<WalletScript>>,
    gates: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
}

impl ScriptedWallet {
    pub fn authorized(accounts: Vec<Address>) -> Self {
        let wallet = Self::default();
        wallet.script().authorized = accounts;
        wallet
    }

    pub fn missing() -> Self {
        let wallet = Self::default();
        wallet.script().available = false;
        wallet
    }

    pub fn script(&self) -> MutexGuard<'_, WalletScript> {
        self.script.lock().expect("wallet script lock")
    }

    pub fn push_response(&self, method: &str, result: Result<Value, PortError>) {
        self.script()
            .overrides
            .entry(method.to_owned())
            .or_default()
            .push_back(result);
    }

    /// The next `method` request suspends until the returned gate is notified.
    pub fn gate(&self, method: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates
            .lock()
            .expect("gate lock")
            .insert(method.to_owned(), notify.clone());
        notify
    }

    pub fn calls(&self, method: &str) -> usize {
        self.script().calls.iter().filter(|(m, _)| m == method).count()
    }

    pub fn methods(&self) -> Vec<String> {
        self.script().calls.iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn last_params(&self, method: &str) -> Option<Value> {
        self.script()
            .calls
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
    }

    pub fn emit(&self, kind: ProviderEventKind) {
        let mut s = self.script();
        s.next_sequence += 1;
        let sequence = s.next_sequence;
        s.events.push(ProviderEvent { sequence, kind });
    }

    fn respond(&self, method: &str, params: &Value) -> Result<Value, PortError> {
        let mut s = self.script();
        if let Some(result) = s.overrides.get_mut(method).and_then(VecDeque::pop_front) {
            return result;
        }
        match method {
            ETH_ACCOUNTS => Ok(accounts_to_json(&s.authorized)),
            ETH_REQUEST_ACCOUNTS => {
                if s.authorized.is_empty() {
                    s.authorized = s.grantable.clone();
                }
                Ok(accounts_to_json(&s.authorized))
            }
            ETH_CHAIN_ID => Ok(json!(chain_id_hex(s.chain_id))),
            WALLET_SWITCH_CHAIN => {
                let target = json_chain_id(&params[0]["chainId"])?;
                if !s.known_chains.contains(&target) {
                    return Err(PortError::rpc(4902, "Unrecognized chain ID"));
                }
                if s.apply_switch {
                    s.chain_id = target;
                }
                Ok(Value::Null)
            }
            WALLET_ADD_CHAIN => {
                let target = json_chain_id(&params[0]["chainId"])?;
                s.known_chains.push(target);
                Ok(Value::Null)
            }
            ETH_CALL => Ok(json!("0x")),
            ETH_SEND_TRANSACTION => Ok(json!(tx_hash())),
            ETH_GET_TRANSACTION_RECEIPT => Ok(Value::Null),
            other => Err(PortError::rpc(4200, format!("unsupported method {other}"))),
        }
    }
}

#[async_trait(?Send)]
impl WalletPort for ScriptedWallet {
    fn is_available(&self) -> bool {
        self.script().available
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        self.script()
            .calls
            .push((method.to_owned(), params.clone()));
        let gate = self.gates.lock().expect("gate lock").remove(method);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.respond(method, &params)
    }

    fn subscribe(&self) -> Result<(), PortError> {
        self.script().subscribed = true;
        Ok(())
    }

    fn unsubscribe(&self) -> Result<(), PortError> {
        self.script().subscribed = false;
        Ok(())
    }

    fn drain_events(&self) -> Result<Vec<ProviderEvent>, PortError> {
        Ok(std::mem::take(&mut self.script().events))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticRpc {
    responses: Arc<Mutex<VecDeque<Result<Value, PortError>>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl StaticRpc {
    pub fn push(&self, result: Result<Value, PortError>) {
        self.responses.lock().expect("rpc lock").push_back(result);
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("rpc lock")
            .iter()
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }
}

#[async_trait(?Send)]
impl RpcPort for StaticRpc {
    async fn request(
        &self,
        endpoint: &str,
        method: &str,
        _params: Value,
    ) -> Result<Value, PortError> {
        self.calls
            .lock()
            .expect("rpc lock")
            .push((endpoint.to_owned(), method.to_owned()));
        self.responses
            .lock()
            .expect("rpc lock")
            .pop_front()
            .unwrap_or_else(|| Err(PortError::Transport("no scripted rpc response".to_owned())))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn seeded(key: &str, value: &str) -> Self {
        let storage = Self::default();
        storage
            .values
            .lock()
            .expect("storage lock")
            .insert(key.to_owned(), value.to_owned());
        storage
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().expect("storage lock").get(key).cloned()
    }
}

impl StoragePort for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self.value(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PortError> {
        self.values
            .lock()
            .expect("storage lock")
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PortError> {
        self.values.lock().expect("storage lock").remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Loading(String, String),
    Success(String, String, Option<String>),
    Error(String, String),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notifier lock").clone()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices().last().cloned()
    }
}

impl NotifierPort for RecordingNotifier {
    fn show_loading(&self, id: &CorrelationId, message: &str) {
        self.notices
            .lock()
            .expect("notifier lock")
            .push(Notice::Loading(id.to_string(), message.to_owned()));
    }

    fn show_success(&self, id: &CorrelationId, message: &str, explorer_url: Option<&str>) {
        self.notices.lock().expect("notifier lock").push(Notice::Success(
            id.to_string(),
            message.to_owned(),
            explorer_url.map(str::to_owned),
        ));
    }

    fn show_error(&self, id: &CorrelationId, message: &str) {
        self.notices
            .lock()
            .expect("notifier lock")
            .push(Notice::Error(id.to_string(), message.to_owned()));
    }
}

/// Sleeps return immediately and advance the clock.
#[derive(Debug, Clone, Default)]
pub struct TestClock {
    now: Arc<AtomicU64>,
}

impl TestClock {
    pub fn slept_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl ClockPort for TestClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        Ok(self.now.load(Ordering::SeqCst) + 1_739_750_400_000)
    }

    async fn sleep_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

pub type TestSession = SessionManager<ScriptedWallet, MemoryStorage>;
pub type TestSwitcher = NetworkSwitcher<ScriptedWallet, MemoryStorage, RecordingNotifier, TestClock>;
pub type TestGateway =
    ContractGateway<ScriptedWallet, MemoryStorage, StaticRpc, RecordingNotifier, TestClock>;

pub struct Harness {
    pub wallet: ScriptedWallet,
    pub storage: MemoryStorage,
    pub rpc: StaticRpc,
    pub notifier: RecordingNotifier,
    pub clock: TestClock,
    pub session: Arc<TestSession>,
    pub switcher: TestSwitcher,
    pub gateway: TestGateway,
}

pub fn harness_with(wallet: ScriptedWallet, storage: MemoryStorage) -> Harness {
    let rpc = StaticRpc::default();
    let notifier = RecordingNotifier::default();
    let clock = TestClock::default();
    let session = Arc::new(
        SessionManager::new(
            wallet.clone(),
            storage.clone(),
            Arc::new(NetworkRegistry::builtin()),
            SessionOptions::default(),
        )
        .expect("session manager"),
    );
    let switcher = NetworkSwitcher::new(
        session.clone(),
        notifier.clone(),
        clock.clone(),
        SwitchOptions {
            confirm_delay_ms: 10,
            confirm_attempts: 1,
        },
    );
    let gateway = ContractGateway::new(
        session.clone(),
        rpc.clone(),
        notifier.clone(),
        clock.clone(),
        GatewayOptions {
            receipt_poll_interval_ms: 10,
            receipt_timeout_ms: 50,
        },
    );
    Harness {
        wallet,
        storage,
        rpc,
        notifier,
        clock,
        session,
        switcher,
        gateway,
    }
}

pub fn harness(wallet: ScriptedWallet) -> Harness {
    harness_with(wallet, MemoryStorage::default())
}

/// Initialized and connected as [`account_a`] on Minato.
pub async fn connected_harness() -> Harness {
    let h = harness(ScriptedWallet::default());
    h.session.initialize_provider().await.expect("initialize");
    h.session.connect().await.expect("connect");
    h
}

pub fn already_participated(draw: u64, participant: Address) -> PortError {
    let data = LottoClient::AlreadyParticipated {
        drawNumber: U256::from(draw),
        participant,
    }
    .abi_encode();
    PortError::rpc_with_data(3, "execution reverted", json!(Bytes::from(data)))
}

pub fn uint_result(value: u64) -> Value {
    json!(Bytes::from(U256::from(value).to_be_bytes::<32>().to_vec()))
}

pub fn participation_receipt(
    contract: Address,
    participant: Address,
    draw: u64,
    ticket: u64,
    numbers: Vec<u8>,
    status: &str,
) -> Value {
    let event = LottoClient::ParticipationRegistered {
        drawNumber: U256::from(draw),
        participationId: U256::from(ticket),
        participant,
        numbers,
    };
    let log = event.encode_log_data();
    json!({
        "transactionHash": tx_hash(),
        "blockNumber": "0x10",
        "status": status,
        "logs": [{
            "address": contract,
            "topics": log.topics(),
            "data": log.data,
        }],
    })
}
