// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::blockchain::ChainClient;
use crate::config::Config;
use crate::directory::WalletDirectory;
use crate::inbox::MessageFeed;
use crate::notify::Notifier;
use crate::pipeline::SettlementPipeline;
use crate::policy::PolicyEngine;
use crate::storage::{BalanceCache, PaymentDb};

/// Shared application state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<PaymentDb>,
    pub directory: WalletDirectory,
    pub policy: PolicyEngine,
    pub pipeline: Arc<SettlementPipeline>,
    pub chain: Arc<ChainClient>,
    pub balances: Arc<BalanceCache>,
    pub notifier: Notifier,
    /// Producer side of the inbound message feed (dev injection endpoint).
    pub feed: MessageFeed,
}
