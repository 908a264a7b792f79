// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup into a
//! [`Config`] value that is shared (behind an `Arc`) with every component.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DB_PATH` | Embedded database file | `./data/emailpay.redb` |
//! | `SEPOLIA_RPC` | Sepolia JSON-RPC endpoint | public node |
//! | `CHAIN_ID` | Expected chain id | `11155111` |
//! | `EXPLORER_BASE` | Block explorer base URL | `https://sepolia.etherscan.io` |
//! | `PYUSD_ADDRESS` | PYUSD ERC-20 contract on Sepolia | Paxos test deployment |
//! | `FRONTEND_URL` | Base URL for verify/onboard links | `http://localhost:3000` |
//! | `MAX_TX_AMOUNT` | Max PYUSD per transaction | `100` |
//! | `DAILY_TX_CAP` | Max PYUSD per sender per day | `500` |
//! | `ETH_MAX_TX_AMOUNT` | Max ETH per transaction | `0.1` |
//! | `ETH_DAILY_TX_CAP` | Max ETH per sender per day | `0.5` |
//! | `TX_EXPIRY_MINUTES` | Intent time-to-live | `30` |
//! | `HOT_WALLET_KEY_FILE` | PEM file holding the funding key | unset |
//! | `HOT_WALLET_PRIVATE_KEY` | Hex funding key (overridden by key file) | unset |
//! | `SIMULATED_FALLBACK` | Fall back to simulated settlement | `true` |
//! | `SWEEP_INTERVAL_SECS` | Expired-pending sweep interval | `300` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::path::PathBuf;

/// Default PYUSD contract on Ethereum Sepolia (Paxos test deployment).
pub const DEFAULT_PYUSD_ADDRESS: &str = "0xCaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9";

/// Default public Sepolia RPC endpoint.
pub const DEFAULT_SEPOLIA_RPC: &str = "https://ethereum-sepolia-rpc.publicnode.com";

/// Per-asset transaction policy limits.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Max PYUSD per transaction.
    pub pyusd_max_tx_amount: f64,
    /// Max PYUSD per sender per calendar day.
    pub pyusd_daily_cap: f64,
    /// Max ETH per transaction.
    pub eth_max_tx_amount: f64,
    /// Max ETH per sender per calendar day.
    pub eth_daily_cap: f64,
    /// How long a transfer intent may stay unexecuted.
    pub expiry_minutes: i64,
}

/// Runtime configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub rpc_url: String,
    pub chain_id: u64,
    pub explorer_url: String,
    pub pyusd_address: String,
    pub frontend_url: String,
    pub policies: PolicyConfig,
    /// PEM file holding the hot-wallet funding key.
    pub hot_wallet_key_file: Option<PathBuf>,
    /// Hex-encoded hot-wallet key (used when no key file is configured).
    pub hot_wallet_private_key: Option<String>,
    /// Whether submission may fall back to the simulated ledger backend.
    pub simulated_fallback: bool,
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8080),
            db_path: PathBuf::from(env_or("DB_PATH", "./data/emailpay.redb")),
            rpc_url: env_or("SEPOLIA_RPC", DEFAULT_SEPOLIA_RPC),
            chain_id: env_parse_or("CHAIN_ID", 11_155_111),
            explorer_url: env_or("EXPLORER_BASE", "https://sepolia.etherscan.io"),
            pyusd_address: env_or("PYUSD_ADDRESS", DEFAULT_PYUSD_ADDRESS),
            frontend_url: env_or("FRONTEND_URL", "http://localhost:3000"),
            policies: PolicyConfig {
                pyusd_max_tx_amount: env_parse_or("MAX_TX_AMOUNT", 100.0),
                pyusd_daily_cap: env_parse_or("DAILY_TX_CAP", 500.0),
                eth_max_tx_amount: env_parse_or("ETH_MAX_TX_AMOUNT", 0.1),
                eth_daily_cap: env_parse_or("ETH_DAILY_TX_CAP", 0.5),
                expiry_minutes: env_parse_or("TX_EXPIRY_MINUTES", 30),
            },
            hot_wallet_key_file: env::var("HOT_WALLET_KEY_FILE").ok().map(PathBuf::from),
            hot_wallet_private_key: env::var("HOT_WALLET_PRIVATE_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            simulated_fallback: env_parse_or("SIMULATED_FALLBACK", true),
            sweep_interval_secs: env_parse_or("SWEEP_INTERVAL_SECS", 300),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
