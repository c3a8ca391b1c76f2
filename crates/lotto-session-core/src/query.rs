//! Read accessors used by the UI. Everything goes through the gateway's read
//! binding, so none of these need a connected wallet.

use alloy::primitives::U256;
use tracing::debug;

use crate::abi::{getCurrentStatusCall, getDrawNumberCall};
use crate::error::WalletError;
use crate::gateway::ContractGateway;
use crate::ports::{ClockPort, NotifierPort, RpcPort, StoragePort, WalletPort};

pub struct QueryFacade<'g, W, S, R, N, C>
where
    W: WalletPort,
    S: StoragePort,
    R: RpcPort,
    N: NotifierPort,
    C: ClockPort,
{
    gateway: &'g ContractGateway<W, S, R, N, C>,
}

impl<'g, W, S, R, N, C> QueryFacade<'g, W, S, R, N, C>
where
    W: WalletPort,
    S: StoragePort,
    R: RpcPort,
    N: NotifierPort,
    C: ClockPort,
{
    pub fn new(gateway: &'g ContractGateway<W, S, R, N, C>) -> Self {
        Self { gateway }
    }

    /// `None` when the contract answered with nothing usable.
    pub async fn current_draw_number(&self) -> Result<Option<U256>, WalletError> {
        let draw = self
            .gateway
            .query(&getDrawNumberCall {})
            .await?
            .map(|r| r._0);
        debug!(?draw, "current draw number");
        Ok(draw)
    }

    pub async fn current_status(&self) -> Result<Option<u8>, WalletError> {
        Ok(self
            .gateway
            .query(&getCurrentStatusCall {})
            .await?
            .map(|r| r._0))
    }
}
