// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-20 token contract interactions.

use std::str::FromStr;

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
};

use super::client::ChainError;

// Define the ERC-20 interface using alloy's sol! macro
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// ERC-20 contract wrapper.
pub struct Erc20Contract<P> {
    contract: IERC20::IERC20Instance<P>,
}

impl<P: Provider + Clone> Erc20Contract<P> {
    /// Create a new ERC-20 contract instance.
    pub fn new(provider: &P, contract_address: &str) -> Result<Self, ChainError> {
        let address = Address::from_str(contract_address)
            .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;

        let contract = IERC20::new(address, provider.clone());

        Ok(Self { contract })
    }

    /// Get the raw balance of an address in token units.
    pub async fn balance_of(&self, wallet_address: &str) -> Result<U256, ChainError> {
        let addr = Address::from_str(wallet_address)
            .map_err(|e| ChainError::InvalidAddress(e.to_string()))?;

        self.contract
            .balanceOf(addr)
            .call()
            .await
            .map_err(|e| ChainError::ContractError(e.to_string()))
    }
}
