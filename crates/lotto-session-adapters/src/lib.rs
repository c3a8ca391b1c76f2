pub mod clock;
pub mod config;
pub mod eip1193;
pub mod notify;
pub mod rpc;
pub mod storage;

pub use clock::SystemClockAdapter;
pub use config::{ClientConfig, ConfigError, RuntimeProfile};
pub use eip1193::Eip1193Adapter;
pub use notify::{Notice, NoticeKind, TracingNotifier};
pub use rpc::HttpRpcAdapter;
#[cfg(target_arch = "wasm32")]
pub use storage::BrowserStorageAdapter;
pub use storage::{MemoryStorageAdapter, PlatformStorage};
