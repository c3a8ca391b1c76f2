//! Supported chains.
//!
//! Descriptors are immutable and shared through `Arc`; sessions and gateways
//! hold references to the same entry rather than copies.

use std::sync::Arc;

use alloy::primitives::{address, Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::ChainId;
use crate::ports::PortError;
use crate::wire::{chain_id_hex, parse_chain_id};

pub const MINATO: &str = "Minato";
pub const MOONBASE: &str = "Moonbase";
pub const SHIBUYA: &str = "Shibuya";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkKind {
    #[serde(rename = "EVM")]
    Evm,
    Substrate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NetworkKind,
    #[serde(with = "hex_chain_id")]
    pub chain_id: ChainId,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Option<Vec<String>>,
    pub add_to_menu: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_link: Option<String>,
    #[serde(default)]
    pub indexer_contract_id: Option<u32>,
    /// Deployed lottery contract; `None` where the chain has no EVM deployment.
    #[serde(default)]
    pub contract_address: Option<Address>,
}

impl NetworkDescriptor {
    pub fn chain_id_hex(&self) -> String {
        chain_id_hex(self.chain_id)
    }

    pub fn primary_rpc_url(&self) -> Option<&str> {
        self.rpc_urls.first().map(String::as_str)
    }

    pub fn explorer_tx_url(&self, hash: &B256) -> Option<String> {
        let base = self.block_explorer_urls.as_ref()?.first()?;
        Some(format!("{}/tx/{hash}", base.trim_end_matches('/')))
    }

    /// Parameters for `wallet_switchEthereumChain`.
    pub fn switch_params(&self) -> Value {
        json!([{ "chainId": self.chain_id_hex() }])
    }

    /// Parameters for `wallet_addEthereumChain`.
    pub fn add_chain_params(&self) -> Value {
        json!([{
            "chainId": self.chain_id_hex(),
            "chainName": self.chain_name,
            "nativeCurrency": self.native_currency,
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": self.block_explorer_urls,
        }])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub name: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: Vec<Arc<NetworkDescriptor>>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NetworkRegistry {
    pub fn new(networks: Vec<NetworkDescriptor>) -> Result<Self, PortError> {
        for (idx, net) in networks.iter().enumerate() {
            if networks[..idx].iter().any(|n| n.name == net.name) {
                return Err(PortError::Validation(format!(
                    "duplicate network name: {}",
                    net.name
                )));
            }
            if networks[..idx].iter().any(|n| n.chain_id == net.chain_id) {
                return Err(PortError::Validation(format!(
                    "duplicate chain id: {}",
                    net.chain_id_hex()
                )));
            }
        }
        Ok(Self {
            networks: networks.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, PortError> {
        let networks: Vec<NetworkDescriptor> = serde_json::from_str(raw)
            .map_err(|e| PortError::Validation(format!("invalid network table: {e}")))?;
        Self::new(networks)
    }

    pub fn builtin() -> Self {
        Self {
            networks: builtin_networks().into_iter().map(Arc::new).collect(),
        }
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<NetworkDescriptor>> {
        self.networks.iter().find(|n| n.name == name).cloned()
    }

    pub fn by_chain_id(&self, chain_id: ChainId) -> Option<Arc<NetworkDescriptor>> {
        self.networks
            .iter()
            .find(|n| n.chain_id == chain_id)
            .cloned()
    }

    pub fn by_chain_id_hex(&self, raw: &str) -> Option<Arc<NetworkDescriptor>> {
        parse_chain_id(raw)
            .ok()
            .and_then(|chain_id| self.by_chain_id(chain_id))
    }

    pub fn menu_entries(&self) -> Vec<MenuEntry> {
        self.networks
            .iter()
            .filter(|n| n.add_to_menu)
            .map(|n| MenuEntry {
                name: n.name.clone(),
                link: n.menu_link.clone(),
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<NetworkDescriptor>> {
        self.networks.iter()
    }
}

fn builtin_networks() -> Vec<NetworkDescriptor> {
    vec![
        NetworkDescriptor {
            name: MINATO.to_owned(),
            kind: NetworkKind::Evm,
            chain_id: 0x79a,
            chain_name: "Minato".to_owned(),
            native_currency: NativeCurrency {
                name: "Minato ETH".to_owned(),
                symbol: "ETH".to_owned(),
                decimals: 18,
            },
            rpc_urls: vec!["https://rpc.minato.soneium.org/".to_owned()],
            block_explorer_urls: Some(vec!["https://explorer-testnet.soneium.org/".to_owned()]),
            add_to_menu: true,
            menu_link: None,
            indexer_contract_id: Some(11),
            contract_address: Some(address!("04d884675E5790721cb5F24D41D460E921C08f17")),
        },
        NetworkDescriptor {
            name: MOONBASE.to_owned(),
            kind: NetworkKind::Evm,
            chain_id: 0x507,
            chain_name: "Moonbase Alpha".to_owned(),
            native_currency: NativeCurrency {
                name: "DEV".to_owned(),
                symbol: "DEV".to_owned(),
                decimals: 18,
            },
            rpc_urls: vec!["https://rpc.api.moonbase.moonbeam.network".to_owned()],
            block_explorer_urls: Some(vec!["https://moonbase.moonscan.io/".to_owned()]),
            add_to_menu: true,
            menu_link: None,
            indexer_contract_id: Some(12),
            contract_address: Some(address!("987461a5eF325f9f217D2b777CeDCf3b9c4D62d5")),
        },
        NetworkDescriptor {
            name: SHIBUYA.to_owned(),
            kind: NetworkKind::Evm,
            chain_id: 0x51,
            chain_name: "Shibuya Network".to_owned(),
            native_currency: NativeCurrency {
                name: "Shibuya".to_owned(),
                symbol: "SBY".to_owned(),
                decimals: 18,
            },
            rpc_urls: vec!["https://evm.shibuya.astar.network".to_owned()],
            block_explorer_urls: Some(vec!["https://shibuya.subscan.io/".to_owned()]),
            add_to_menu: true,
            menu_link: Some("https://lucky.substrate.fi/lotto/shibuya".to_owned()),
            indexer_contract_id: Some(10),
            // Shibuya's lottery is an ink! contract; there is no EVM deployment.
            contract_address: None,
        },
    ]
}

mod hex_chain_id {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    use crate::wire::{chain_id_hex, json_chain_id};

    pub fn serialize<S: Serializer>(chain_id: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&chain_id_hex(*chain_id))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let raw = Value::deserialize(d)?;
        json_chain_id(&raw).map_err(serde::de::Error::custom)
    }
}
