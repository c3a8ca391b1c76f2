//! Bridge between the shell and the session workspace crates.
//! This must remain the only shell-facing boundary for wallet and contract
//! operations.

use std::sync::Arc;

use alloy::primitives::U256;
use tracing::{debug, info};

use lotto_session_adapters::{
    ClientConfig, Eip1193Adapter, HttpRpcAdapter, Notice, PlatformStorage, SystemClockAdapter,
    TracingNotifier,
};
use lotto_session_core::{
    ClockPort, ContractGateway, CorrelationId, EventRecoverySummary, MenuEntry, NetworkRegistry,
    NetworkSwitcher, QueryFacade, Session, SessionManager, SwitchOutcome, TxResult, WalletError,
};

use crate::participation_form::ParticipationForm;

type LottoSession = SessionManager<Eip1193Adapter, PlatformStorage>;
type LottoSwitcher =
    NetworkSwitcher<Eip1193Adapter, PlatformStorage, TracingNotifier, SystemClockAdapter>;
pub type LottoGateway = ContractGateway<
    Eip1193Adapter,
    PlatformStorage,
    HttpRpcAdapter,
    TracingNotifier,
    SystemClockAdapter,
>;

/// One session, one switcher and one gateway sharing the same wallet
/// handle. Cloning shares them.
#[derive(Clone)]
pub struct ClientBridge {
    session: Arc<LottoSession>,
    switcher: Arc<LottoSwitcher>,
    gateway: Arc<LottoGateway>,
    notifier: TracingNotifier,
    clock: SystemClockAdapter,
}

impl ClientBridge {
    pub fn new(config: &ClientConfig) -> Result<Self, WalletError> {
        Self::with_wallet(config, Eip1193Adapter::with_config(config.clone()))
    }

    pub fn with_wallet(config: &ClientConfig, wallet: Eip1193Adapter) -> Result<Self, WalletError> {
        let notifier = TracingNotifier::with_config(config);
        let clock = SystemClockAdapter;
        let session = Arc::new(SessionManager::new(
            wallet,
            PlatformStorage::default(),
            Arc::new(NetworkRegistry::builtin()),
            config.session_options(),
        )?);
        let switcher = Arc::new(NetworkSwitcher::new(
            Arc::clone(&session),
            notifier.clone(),
            clock.clone(),
            config.switch_options(),
        ));
        let gateway = Arc::new(ContractGateway::new(
            Arc::clone(&session),
            HttpRpcAdapter::with_config(config),
            notifier.clone(),
            clock.clone(),
            config.gateway_options(),
        ));
        debug!(default_chain = %config.default_chain, "client bridge wired");
        Ok(Self {
            session,
            switcher,
            gateway,
            notifier,
            clock,
        })
    }

    pub fn gateway(&self) -> &LottoGateway {
        &self.gateway
    }

    pub fn snapshot(&self) -> Result<Session, WalletError> {
        self.session.snapshot()
    }

    pub fn menu_entries(&self) -> Vec<MenuEntry> {
        self.session.registry().menu_entries()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notifier.active()
    }

    /// Mount: detect the wallet, restore a remembered session and start
    /// listening for wallet events.
    pub async fn start(&self) -> Result<Session, WalletError> {
        let session = self.session.initialize_provider().await?;
        self.session.register_handlers()?;
        info!(connected = session.is_connected(), "client started");
        Ok(session)
    }

    pub fn shutdown(&self) -> Result<(), WalletError> {
        self.session.unregister_handlers()
    }

    pub async fn poll_events(&self) -> Result<EventRecoverySummary, WalletError> {
        self.session.process_events().await
    }

    pub async fn reconcile(&self) -> Result<Session, WalletError> {
        self.session.check_and_reconcile().await
    }

    pub async fn connect(&self) -> Result<Session, WalletError> {
        self.session.connect().await
    }

    pub fn disconnect(&self) -> Result<Session, WalletError> {
        self.session.disconnect()
    }

    pub fn is_switching(&self) -> bool {
        self.switcher.is_switching()
    }

    pub async fn switch_to(&self, network: &str) -> Result<SwitchOutcome, WalletError> {
        self.switcher.switch_to(network).await
    }

    pub async fn current_draw_number(&self) -> Result<Option<U256>, WalletError> {
        QueryFacade::new(self.gateway.as_ref())
            .current_draw_number()
            .await
    }

    pub async fn refresh_eligibility(&self, form: &mut ParticipationForm) -> Result<(), WalletError> {
        form.refresh_eligibility(self.gateway.as_ref()).await.map(|_| ())
    }

    pub async fn participate(&self, form: &mut ParticipationForm) -> Result<TxResult, WalletError> {
        let id = CorrelationId::from_clock("participate", self.clock.now_ms()?);
        form.submit(self.gateway.as_ref(), id).await
    }
}
