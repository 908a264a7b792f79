// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction building and broadcasting for Ethereum Sepolia.
//!
//! EIP-1559 transaction construction, fee estimation, and submission for
//! native ETH and ERC-20 (PYUSD) transfers, plus receipt polling.

use std::str::FromStr;
use std::time::Duration;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, U256},
    providers::{Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};

use super::client::ChainError;
use super::erc20::IERC20;
use super::types::NetworkConfig;

/// How often to poll for a receipt after submission.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Give up waiting for inclusion after this many polls.
const RECEIPT_POLL_ATTEMPTS: u32 = 40;

/// Transaction send result.
#[derive(Debug, Clone)]
pub struct SendResult {
    /// Transaction hash
    pub tx_hash: String,
    /// Explorer URL for the transaction
    pub explorer_url: String,
}

/// Transaction receipt after confirmation.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: String,
    /// Block number where transaction was included
    pub block_number: u64,
    /// Whether the transaction succeeded on chain
    pub success: bool,
}

/// Signing transaction sender for Ethereum Sepolia.
pub struct TxSender {
    network: NetworkConfig,
    provider: alloy::providers::fillers::FillProvider<
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::JoinFill<
                alloy::providers::Identity,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::GasFiller,
                    alloy::providers::fillers::JoinFill<
                        alloy::providers::fillers::BlobGasFiller,
                        alloy::providers::fillers::JoinFill<
                            alloy::providers::fillers::NonceFiller,
                            alloy::providers::fillers::ChainIdFiller,
                        >,
                    >,
                >,
            >,
            alloy::providers::fillers::WalletFiller<EthereumWallet>,
        >,
        alloy::providers::RootProvider<alloy::network::Ethereum>,
    >,
}

impl TxSender {
    /// Create a new sender with signing capabilities.
    pub fn new(network: NetworkConfig, wallet: EthereumWallet) -> Result<Self, ChainError> {
        let url: url::Url = network
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);

        Ok(Self { network, provider })
    }

    /// Current EIP-1559 fee pair: (max fee, priority fee).
    async fn get_gas_prices(&self) -> Result<(u128, u128), ChainError> {
        let block = self
            .provider
            .get_block_by_number(alloy::eips::BlockNumberOrTag::Latest)
            .await
            .map_err(|e| ChainError::RpcError(format!("Failed to get block: {}", e)))?
            .ok_or_else(|| ChainError::RpcError("No latest block".to_string()))?;

        let base_fee: u128 = block
            .header
            .base_fee_per_gas
            .map(|f| f as u128)
            .unwrap_or(25_000_000_000u128); // 25 gwei default

        let priority_fee: u128 = 1_500_000_000; // 1.5 gwei

        // Max fee = 2 * base_fee + priority_fee (allows for base fee increase)
        let max_fee = base_fee.saturating_mul(2).saturating_add(priority_fee);

        Ok((max_fee, priority_fee))
    }

    /// Send a native ETH transfer.
    pub async fn send_native(&self, to: &str, amount_wei: U256) -> Result<SendResult, ChainError> {
        let to_addr = Address::from_str(to)
            .map_err(|e| ChainError::InvalidAddress(format!("Invalid to address: {}", e)))?;

        let (max_fee_per_gas, priority_fee) = self.get_gas_prices().await?;

        let tx = TransactionRequest::default()
            .to(to_addr)
            .value(amount_wei)
            .max_fee_per_gas(max_fee_per_gas)
            .max_priority_fee_per_gas(priority_fee);

        self.send_transaction(tx).await
    }

    /// Send an ERC-20 token transfer.
    pub async fn send_token(
        &self,
        token_address: &str,
        to: &str,
        amount: U256,
    ) -> Result<SendResult, ChainError> {
        let to_addr = Address::from_str(to)
            .map_err(|e| ChainError::InvalidAddress(format!("Invalid to address: {}", e)))?;
        let token_addr = Address::from_str(token_address)
            .map_err(|e| ChainError::InvalidAddress(format!("Invalid token address: {}", e)))?;

        // Encode the transfer(to, amount) call
        let call = IERC20::transferCall {
            to: to_addr,
            amount,
        };
        let data = call.abi_encode();

        let (max_fee_per_gas, priority_fee) = self.get_gas_prices().await?;

        let tx = TransactionRequest::default()
            .to(token_addr)
            .input(data.into())
            .max_fee_per_gas(max_fee_per_gas)
            .max_priority_fee_per_gas(priority_fee);

        self.send_transaction(tx).await
    }

    /// Internal helper to send a transaction and return the hash.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<SendResult, ChainError> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::TransactionFailed(format!("Failed to send: {}", e)))?;

        let tx_hash = format!("{:?}", pending.tx_hash());
        let explorer_url = self.network.tx_url(&tx_hash);

        Ok(SendResult {
            tx_hash,
            explorer_url,
        })
    }

    /// Poll until the transaction is included and return its receipt.
    pub async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<TxReceipt, ChainError> {
        let hash = tx_hash
            .parse()
            .map_err(|e| ChainError::InvalidAddress(format!("Invalid tx hash: {}", e)))?;

        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| ChainError::RpcError(format!("Failed to get receipt: {}", e)))?;

            if let Some(receipt) = receipt {
                return Ok(TxReceipt {
                    tx_hash: tx_hash.to_string(),
                    block_number: receipt.block_number.unwrap_or(0),
                    success: receipt.status(),
                });
            }

            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }

        Err(ChainError::RpcError(format!(
            "Transaction {tx_hash} not confirmed after {} polls",
            RECEIPT_POLL_ATTEMPTS
        )))
    }
}

/// Parse a human-readable amount to wei (or token units).
///
/// # Arguments
/// * `amount` - Amount as a string (e.g., "1.5")
/// * `decimals` - Number of decimals (18 for ETH, 6 for PYUSD)
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, ChainError> {
    let parts: Vec<&str> = amount.split('.').collect();

    if parts.len() > 2 {
        return Err(ChainError::InvalidAmount("Invalid amount format".to_string()));
    }

    let whole = parts[0]
        .parse::<u128>()
        .map_err(|_| ChainError::InvalidAmount("Invalid whole number".to_string()))?;

    let decimal_part = if parts.len() == 2 {
        let dec_str = parts[1];
        if dec_str.len() > decimals as usize {
            return Err(ChainError::InvalidAmount(format!(
                "Too many decimal places (max {})",
                decimals
            )));
        }
        // Pad with zeros to match decimals
        let padded = format!("{:0<width$}", dec_str, width = decimals as usize);
        padded
            .parse::<u128>()
            .map_err(|_| ChainError::InvalidAmount("Invalid decimal".to_string()))?
    } else {
        0u128
    };

    let multiplier = 10u128.pow(decimals as u32);
    let total = whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(decimal_part))
        .ok_or_else(|| ChainError::InvalidAmount("Amount overflow".to_string()))?;

    Ok(U256::from(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_whole() {
        let result = parse_amount("1", 18).unwrap();
        assert_eq!(result, U256::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn test_parse_amount_decimal() {
        let result = parse_amount("1.5", 18).unwrap();
        assert_eq!(result, U256::from(1_500_000_000_000_000_000u64));
    }

    #[test]
    fn test_parse_amount_pyusd() {
        // 25.5 PYUSD = 25_500_000 (6 decimals)
        let result = parse_amount("25.5", 6).unwrap();
        assert_eq!(result, U256::from(25_500_000u64));
    }

    #[test]
    fn test_parse_amount_small() {
        let result = parse_amount("0.001", 18).unwrap();
        assert_eq!(result, U256::from(1_000_000_000_000_000u64));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert!(parse_amount("1.2.3", 6).is_err());
        assert!(parse_amount("abc", 6).is_err());
        // More fractional digits than the token supports
        assert!(parse_amount("1.1234567", 6).is_err());
    }
}
