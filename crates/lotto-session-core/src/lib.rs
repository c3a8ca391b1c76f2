pub mod abi;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod network_switch;
pub mod networks;
pub mod participation;
pub mod ports;
pub mod query;
pub mod session;
pub mod state_machine;
pub mod wire;

pub use domain::{
    short_address, ActiveChain, ChainId, CorrelationId, DryRunResult, EventRecoverySummary,
    ParticipationRecord, ProviderEvent, ProviderEventKind, Session, TxIntent, TxResult,
};
pub use error::{classify, ContractRevert, WalletError};
pub use gateway::{BindingCapability, ContractBinding, ContractGateway, GatewayOptions};
pub use network_switch::{NetworkSwitcher, SwitchOptions, SwitchOutcome};
pub use networks::{MenuEntry, NetworkDescriptor, NetworkRegistry};
pub use ports::{ClockPort, NotifierPort, PortError, RpcPort, StoragePort, WalletPort};
pub use query::QueryFacade;
pub use session::{SessionManager, SessionOptions};
pub use state_machine::{SessionAction, SessionState, StateTransition};
