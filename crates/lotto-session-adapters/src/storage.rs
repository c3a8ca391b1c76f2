//! Key/value persistence for the remembered account.
//!
//! Browsers hand back the literal string `"undefined"` when a value was stored
//! from an unset variable; both adapters read it as absent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use lotto_session_core::{PortError, StoragePort};

const UNDEFINED: &str = "undefined";

#[derive(Debug, Clone, Default)]
pub struct MemoryStorageAdapter {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorageAdapter {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, PortError> {
        self.values
            .lock()
            .map_err(|e| PortError::Transport(format!("storage lock poisoned: {e}")))
    }
}

impl StoragePort for MemoryStorageAdapter {
    fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self.lock()?.get(key).cloned().filter(|v| v != UNDEFINED))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PortError> {
        self.lock()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PortError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Default)]
pub struct BrowserStorageAdapter;

#[cfg(target_arch = "wasm32")]
impl BrowserStorageAdapter {
    fn storage(&self) -> Result<web_sys::Storage, PortError> {
        web_sys::window()
            .ok_or_else(|| PortError::Transport("missing window".to_owned()))?
            .local_storage()
            .map_err(|e| PortError::Transport(format!("localStorage unavailable: {e:?}")))?
            .ok_or_else(|| PortError::NotFound("localStorage disabled".to_owned()))
    }
}

#[cfg(target_arch = "wasm32")]
impl StoragePort for BrowserStorageAdapter {
    fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        let value = self
            .storage()?
            .get_item(key)
            .map_err(|e| PortError::Transport(format!("localStorage read {key}: {e:?}")))?;
        Ok(value.filter(|v| v != UNDEFINED))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PortError> {
        self.storage()?
            .set_item(key, value)
            .map_err(|e| PortError::Transport(format!("localStorage write {key}: {e:?}")))
    }

    fn remove(&self, key: &str) -> Result<(), PortError> {
        self.storage()?
            .remove_item(key)
            .map_err(|e| PortError::Transport(format!("localStorage remove {key}: {e:?}")))
    }
}

#[cfg(target_arch = "wasm32")]
pub type PlatformStorage = BrowserStorageAdapter;
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformStorage = MemoryStorageAdapter;
