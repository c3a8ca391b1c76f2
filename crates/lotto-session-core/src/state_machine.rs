use serde::{Deserialize, Serialize};

use crate::ports::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    BeginInit,
    ProviderReady,
    ProviderMissing,
    BeginConnect,
    AccountsAuthorized,
    AccountsCleared,
    ConnectAborted,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,
    pub reason: &'static str,
}

pub fn session_transition(
    from: SessionState,
    action: SessionAction,
) -> Result<(SessionState, StateTransition), PortError> {
    use SessionAction as A;
    use SessionState as S;

    let (to, reason) = match (from, action) {
        (S::Uninitialized | S::Disconnected | S::Connected, A::BeginInit) => {
            (S::Initializing, "provider_init")
        }
        (S::Initializing, A::ProviderReady) => (S::Disconnected, "provider_ready"),
        (S::Initializing, A::ProviderMissing) => (S::Uninitialized, "no_wallet_detected"),
        (S::Disconnected | S::Connected, A::BeginConnect) => (S::Connecting, "connect_requested"),
        (S::Disconnected | S::Connected | S::Connecting, A::AccountsAuthorized) => {
            (S::Connected, "accounts_authorized")
        }
        (S::Disconnected | S::Connected | S::Connecting, A::AccountsCleared) => {
            (S::Disconnected, "accounts_cleared")
        }
        (S::Connecting, A::ConnectAborted) => (S::Disconnected, "connect_aborted"),
        (S::Disconnected | S::Connected | S::Connecting, A::Disconnect) => {
            (S::Disconnected, "disconnect")
        }
        _ => {
            return Err(PortError::Conflict(format!(
                "illegal session transition: {from:?} --{action:?}-->"
            )))
        }
    };

    Ok((
        to,
        StateTransition {
            from,
            to,
            reason,
        },
    ))
}
