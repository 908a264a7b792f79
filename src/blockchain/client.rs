// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only Sepolia client for balance and chain-state queries.

use std::str::FromStr;

use alloy::{
    network::Ethereum,
    primitives::{Address, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
};

use super::erc20::Erc20Contract;
use super::types::{Balances, NetworkConfig, PYUSD_TOKEN};

/// HTTP provider type for Sepolia (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Ethereum Sepolia chain client.
pub struct ChainClient {
    /// PYUSD contract address on this network
    pyusd_address: String,
    /// Alloy HTTP provider
    provider: HttpProvider,
}

impl ChainClient {
    /// Create a new client for the specified network.
    pub fn new(network: NetworkConfig, pyusd_address: &str) -> Result<Self, ChainError> {
        let url: url::Url = network
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            pyusd_address: pyusd_address.to_string(),
            provider,
        })
    }

    /// Get the formatted native ETH balance for an address.
    pub async fn get_eth_balance(&self, address: &str) -> Result<String, ChainError> {
        let addr = Address::from_str(address)
            .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;

        let balance = self
            .provider
            .get_balance(addr)
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;

        Ok(format_units(balance, 18))
    }

    /// Get the formatted PYUSD balance for an address.
    pub async fn get_pyusd_balance(&self, address: &str) -> Result<String, ChainError> {
        let contract = Erc20Contract::new(&self.provider, &self.pyusd_address)?;
        let balance = contract.balance_of(address).await?;
        Ok(format_units(balance, PYUSD_TOKEN.decimals))
    }

    /// Get both balances for a wallet. A failed lookup degrades to "0" so
    /// one flaky token read doesn't take the whole wallet view down.
    pub async fn get_balances(&self, address: &str) -> Balances {
        let eth = match self.get_eth_balance(address).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "ETH balance lookup failed");
                "0".to_string()
            }
        };

        let pyusd = match self.get_pyusd_balance(address).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "PYUSD balance lookup failed");
                "0".to_string()
            }
        };

        Balances { eth, pyusd }
    }
}

/// Format a raw balance with the specified number of decimals, trimming to
/// at most 6 fractional digits.
pub fn format_units(balance: U256, decimals: u8) -> String {
    if balance.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = balance / divisor;
    let remainder = balance % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, &trimmed[..trimmed.len().min(6)])
        }
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract error: {0}")]
    ContractError(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}
