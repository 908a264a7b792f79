// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ethereum Sepolia Integration
//!
//! Chain access for the settlement layer: balance queries, EIP-1559
//! transaction submission, and receipt polling via alloy.

pub mod client;
pub mod erc20;
pub mod transactions;
pub mod types;

pub use client::{format_units, ChainClient, ChainError};
pub use transactions::{parse_amount, SendResult, TxReceipt, TxSender};
pub use types::{Balances, Erc20Token, NetworkConfig, PYUSD_TOKEN};
