// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Config;

/// Settlement network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: String,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: String,
    /// Block explorer URL
    pub explorer_url: String,
}

impl NetworkConfig {
    /// Ethereum Sepolia testnet with default public endpoints.
    pub fn sepolia() -> Self {
        Self {
            name: "Ethereum Sepolia".to_string(),
            chain_id: 11_155_111,
            rpc_url: crate::config::DEFAULT_SEPOLIA_RPC.to_string(),
            explorer_url: "https://sepolia.etherscan.io".to_string(),
        }
    }

    /// Network built from runtime configuration (RPC/explorer overrides).
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: "Ethereum Sepolia".to_string(),
            chain_id: config.chain_id,
            rpc_url: config.rpc_url.clone(),
            explorer_url: config.explorer_url.clone(),
        }
    }

    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }
}

/// Known ERC-20 token metadata.
#[derive(Debug, Clone)]
pub struct Erc20Token {
    pub symbol: &'static str,
    pub name: &'static str,
    pub decimals: u8,
    /// Sepolia contract address
    pub sepolia_address: &'static str,
}

/// PYUSD on Ethereum Sepolia (Paxos test deployment).
pub const PYUSD_TOKEN: Erc20Token = Erc20Token {
    symbol: "PYUSD",
    name: "PayPal USD",
    decimals: 6,
    sepolia_address: crate::config::DEFAULT_PYUSD_ADDRESS,
};

/// Formatted balances for a wallet, both assets the service moves.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Balances {
    /// Native ETH balance, human units.
    pub eth: String,
    /// PYUSD balance, human units.
    pub pyusd: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sepolia_defaults() {
        let network = NetworkConfig::sepolia();
        assert_eq!(network.chain_id, 11_155_111);
        assert_eq!(
            network.tx_url("0xabc"),
            "https://sepolia.etherscan.io/tx/0xabc"
        );
    }

    #[test]
    fn pyusd_metadata() {
        assert_eq!(PYUSD_TOKEN.decimals, 6);
        assert!(PYUSD_TOKEN.sepolia_address.starts_with("0x"));
    }
}
