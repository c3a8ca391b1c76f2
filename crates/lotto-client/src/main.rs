//! Headless lottery client: restores the wallet session and reports the
//! current draw.

use eyre::Result;
use tracing::{info, warn};

use lotto_client::ClientBridge;
use lotto_session_adapters::ClientConfig;
use lotto_session_core::{short_address, WalletError};

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {
    tracing_wasm::set_as_global_default();
    wasm_bindgen_futures::spawn_local(async {
        if let Err(e) = run().await {
            tracing::error!(error = %e, "lotto-client stopped");
        }
    });
}

async fn run() -> Result<()> {
    let config = ClientConfig::from_env()?;
    info!(
        profile = ?config.runtime_profile,
        chain = %config.default_chain,
        "Starting lotto-client"
    );

    let bridge = ClientBridge::new(&config)?;
    for entry in bridge.menu_entries() {
        info!(network = %entry.name, link = ?entry.link, "network available");
    }

    match bridge.start().await {
        Ok(_) => {
            let summary = bridge.poll_events().await?;
            if summary.drained_events > 0 {
                info!(events = summary.drained_events, "applied wallet events");
            }
            bridge.reconcile().await?;
        }
        Err(WalletError::NoWalletDetected) => {
            warn!("no wallet available, continuing read-only");
        }
        Err(e) => return Err(e.into()),
    }

    let session = bridge.snapshot()?;
    match session.account {
        Some(account) => info!(
            account = %short_address(&account),
            chain = ?session.active_chain,
            "wallet session"
        ),
        None => info!(chain = ?session.active_chain, "no connected account"),
    }

    match bridge.current_draw_number().await {
        Ok(Some(draw)) => info!(%draw, "current draw"),
        Ok(None) => warn!("draw number unavailable"),
        Err(e) => warn!(error = %e, "{}", e.user_message()),
    }

    bridge.shutdown()?;
    Ok(())
}
