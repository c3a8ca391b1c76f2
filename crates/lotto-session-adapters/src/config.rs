use std::str::FromStr;

use thiserror::Error;

use lotto_session_core::networks::MINATO;
use lotto_session_core::session::ACCOUNT_STORAGE_KEY;
use lotto_session_core::{GatewayOptions, SessionOptions, SwitchOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeProfile {
    #[default]
    Development,
    Production,
}

impl FromStr for RuntimeProfile {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::UnknownProfile(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown runtime profile: {0}")]
    UnknownProfile(String),
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub runtime_profile: RuntimeProfile,
    pub default_chain: String,
    pub account_storage_key: String,
    /// JSON-RPC endpoint standing in for `window.ethereum` on native runs.
    pub eip1193_proxy_url: Option<String>,
    pub rpc_timeout_ms: u64,
    pub switch_confirm_delay_ms: u64,
    pub switch_confirm_attempts: u32,
    pub receipt_poll_interval_ms: u64,
    pub receipt_timeout_ms: u64,
    pub success_notice_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            default_chain: MINATO.to_owned(),
            account_storage_key: ACCOUNT_STORAGE_KEY.to_owned(),
            eip1193_proxy_url: None,
            rpc_timeout_ms: 15_000,
            switch_confirm_delay_ms: 1_000,
            switch_confirm_attempts: 1,
            receipt_poll_interval_ms: 1_500,
            receipt_timeout_ms: 120_000,
            success_notice_ms: 10_000,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their default.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup("LOTTO_RUNTIME_PROFILE") {
            cfg.runtime_profile = raw.parse()?;
        }
        if let Some(raw) = lookup("LOTTO_DEFAULT_CHAIN") {
            cfg.default_chain = raw.trim().to_owned();
        }
        cfg.eip1193_proxy_url = lookup("LOTTO_EIP1193_PROXY_URL")
            .map(|raw| raw.trim().to_owned())
            .filter(|raw| !raw.is_empty());
        parse_into(&lookup, "LOTTO_RPC_TIMEOUT_MS", &mut cfg.rpc_timeout_ms)?;
        parse_into(
            &lookup,
            "LOTTO_SWITCH_CONFIRM_DELAY_MS",
            &mut cfg.switch_confirm_delay_ms,
        )?;
        parse_into(
            &lookup,
            "LOTTO_SWITCH_CONFIRM_ATTEMPTS",
            &mut cfg.switch_confirm_attempts,
        )?;
        parse_into(
            &lookup,
            "LOTTO_RECEIPT_POLL_INTERVAL_MS",
            &mut cfg.receipt_poll_interval_ms,
        )?;
        parse_into(&lookup, "LOTTO_RECEIPT_TIMEOUT_MS", &mut cfg.receipt_timeout_ms)?;
        parse_into(&lookup, "LOTTO_SUCCESS_NOTICE_MS", &mut cfg.success_notice_ms)?;
        Ok(cfg)
    }

    /// Production never falls back to the deterministic wallet.
    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            default_chain: self.default_chain.clone(),
            account_storage_key: self.account_storage_key.clone(),
        }
    }

    pub fn switch_options(&self) -> SwitchOptions {
        SwitchOptions {
            confirm_delay_ms: self.switch_confirm_delay_ms,
            confirm_attempts: self.switch_confirm_attempts,
        }
    }

    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            receipt_poll_interval_ms: self.receipt_poll_interval_ms,
            receipt_timeout_ms: self.receipt_timeout_ms,
        }
    }
}

fn parse_into<F, T>(lookup: &F, var: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(var) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var,
            value: raw.clone(),
        })?;
    }
    Ok(())
}
