//! Network configuration.
//!
//! The rating contract is deployed to one chain per environment. A
//! `NetworkConfig` carries that chain's id, the RPC endpoint and the contract
//! address into client constructors; nothing here is global state.

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};

/// Default fixed-point decimals of the contract's average score.
pub const DEFAULT_SCORE_DECIMALS: u32 = 2;

/// Resolved settings for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub contract_address: Option<Address>,
    pub score_decimals: u32,
}

impl NetworkConfig {
    /// Contract address, or a configuration error naming the network.
    pub fn contract(&self) -> Result<Address> {
        self.contract_address.ok_or_else(|| {
            ChainError::ConfigError(format!(
                "No contract address configured for network '{}'. Set MODELREP_CONTRACT or contract_address in the config file",
                self.name
            ))
        })
    }
}

/// Built-in network entry.
#[derive(Debug, Clone)]
pub struct KnownNetwork {
    pub name: &'static str,
    pub chain_id: u64,
    pub rpc_urls: &'static [&'static str],
    pub contract_address: Option<&'static str>,
    pub description: &'static str,
}

impl KnownNetwork {
    /// Config using the first RPC URL and the known deployment, if any.
    pub fn to_config(&self) -> NetworkConfig {
        NetworkConfig {
            name: self.name.to_string(),
            chain_id: self.chain_id,
            rpc_url: self.rpc_urls.first().map(|s| s.to_string()).unwrap_or_default(),
            contract_address: self.contract_address.and_then(|a| a.parse().ok()),
            score_decimals: DEFAULT_SCORE_DECIMALS,
        }
    }
}

/// All built-in networks.
pub const NETWORKS: &[KnownNetwork] = &[
    KnownNetwork {
        name: "sepolia",
        chain_id: 11155111,
        rpc_urls: &[
            "https://ethereum-sepolia.publicnode.com",
            "https://rpc.sepolia.org",
            "https://1rpc.io/sepolia",
        ],
        contract_address: None,
        description: "Ethereum Sepolia Testnet",
    },
    KnownNetwork {
        name: "base-sepolia",
        chain_id: 84532,
        rpc_urls: &["https://sepolia.base.org", "https://base-sepolia-rpc.publicnode.com"],
        contract_address: None,
        description: "Base Sepolia Testnet",
    },
    KnownNetwork {
        name: "base",
        chain_id: 8453,
        rpc_urls: &[
            "https://base.publicnode.com",
            "https://mainnet.base.org",
            "https://1rpc.io/base",
        ],
        contract_address: None,
        description: "Base Mainnet (Coinbase L2)",
    },
    KnownNetwork {
        name: "local",
        chain_id: 31337,
        rpc_urls: &["http://127.0.0.1:8545"],
        // first contract deployed by anvil's default account
        contract_address: Some("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
        description: "Local anvil / hardhat node",
    },
];

/// Get network by name.
pub fn get_network(name: &str) -> Option<&'static KnownNetwork> {
    NETWORKS.iter().find(|n| n.name.eq_ignore_ascii_case(name))
}
