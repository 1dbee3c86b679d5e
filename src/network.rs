use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::{chain_id_hex, ChainId};

pub const HARDHAT_CHAIN_ID: ChainId = 1337;
pub const SEPOLIA_CHAIN_ID: ChainId = 11_155_111;
pub const MAINNET_CHAIN_ID: ChainId = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl NativeCurrency {
    pub fn ether() -> Self {
        Self {
            name: "Ether".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        }
    }
}

impl Default for NativeCurrency {
    fn default() -> Self {
        Self::ether()
    }
}

/// Static metadata for a chain the client knows about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub chain_id: ChainId,
    pub name: String,
    pub rpc_url: String,
    #[serde(default)]
    pub supported: bool,
    #[serde(default)]
    pub native_currency: NativeCurrency,
    #[serde(default)]
    pub block_explorer: Option<String>,
}

impl NetworkDescriptor {
    /// Parameters for `wallet_addEthereumChain`.
    pub fn add_chain_params(&self) -> Value {
        let explorers: Vec<&str> = self.block_explorer.iter().map(String::as_str).collect();
        json!({
            "chainId": chain_id_hex(self.chain_id),
            "chainName": self.name,
            "rpcUrls": [self.rpc_url],
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "blockExplorerUrls": explorers,
        })
    }
}

/// Resolved view of the wallet's active chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    pub chain_id: ChainId,
    pub name: String,
    pub is_supported: bool,
}

/// Chain-id keyed table of known networks.
#[derive(Clone, Debug)]
pub struct NetworkRegistry {
    networks: BTreeMap<ChainId, NetworkDescriptor>,
}

impl NetworkRegistry {
    pub fn empty() -> Self {
        Self {
            networks: BTreeMap::new(),
        }
    }

    /// Hardhat, Sepolia and mainnet; only the first two are supported.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.insert(NetworkDescriptor {
            chain_id: HARDHAT_CHAIN_ID,
            name: "Hardhat Local".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            supported: true,
            native_currency: NativeCurrency::ether(),
            block_explorer: None,
        });
        registry.insert(NetworkDescriptor {
            chain_id: SEPOLIA_CHAIN_ID,
            name: "Sepolia Testnet".to_string(),
            rpc_url: "https://sepolia.infura.io/v3/".to_string(),
            supported: true,
            native_currency: NativeCurrency {
                name: "Sepolia Ether".to_string(),
                symbol: "SEP".to_string(),
                decimals: 18,
            },
            block_explorer: Some("https://sepolia.etherscan.io".to_string()),
        });
        registry.insert(NetworkDescriptor {
            chain_id: MAINNET_CHAIN_ID,
            name: "Ethereum Mainnet".to_string(),
            rpc_url: "https://mainnet.infura.io/v3/".to_string(),
            supported: false,
            native_currency: NativeCurrency::ether(),
            block_explorer: Some("https://etherscan.io".to_string()),
        });
        registry
    }

    /// Adds a descriptor, replacing any existing entry for the same chain.
    pub fn insert(&mut self, descriptor: NetworkDescriptor) -> Option<NetworkDescriptor> {
        self.networks.insert(descriptor.chain_id, descriptor)
    }

    pub fn get(&self, chain_id: ChainId) -> Option<&NetworkDescriptor> {
        self.networks.get(&chain_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkDescriptor> {
        self.networks.values()
    }

    pub fn resolve(&self, chain_id: ChainId) -> NetworkInfo {
        match self.get(chain_id) {
            Some(descriptor) => NetworkInfo {
                chain_id,
                name: descriptor.name.clone(),
                is_supported: descriptor.supported,
            },
            None => NetworkInfo {
                chain_id,
                name: format!("Unknown Network ({chain_id})"),
                is_supported: false,
            },
        }
    }

    pub fn is_supported(&self, chain_id: ChainId) -> bool {
        self.get(chain_id).map_or(false, |descriptor| descriptor.supported)
    }

    pub fn is_testnet(chain_id: ChainId) -> bool {
        matches!(chain_id, HARDHAT_CHAIN_ID | SEPOLIA_CHAIN_ID)
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
