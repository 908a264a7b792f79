// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Policy Engine
//!
//! Per-asset spend limits and transfer-intent construction. Two independent
//! rules apply to every transfer:
//!
//! - a maximum single-transaction amount, and
//! - a rolling daily cap evaluated against the sender's spend counter.
//!
//! Both are checked on every validation pass and all breached rules are
//! reported together, so a sender learns every problem at once. Boundary
//! equality is allowed on both rules: a transaction may land exactly on the
//! per-transaction maximum, and may bring the daily total exactly to the cap.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::{Config, PolicyConfig};
use crate::models::{Asset, EmailAddress, IntentStatus, TransferIntent};

/// Limits for one asset.
#[derive(Debug, Clone, Copy)]
pub struct AssetPolicy {
    /// Max amount per transaction. Exact equality is allowed.
    pub max_tx_amount: f64,
    /// Max cumulative amount per sender per calendar day. Exact equality is
    /// allowed.
    pub daily_cap: f64,
}

/// Outcome of a policy validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyCheck {
    /// Human-readable description of every breached rule, in rule order.
    pub violations: Vec<String>,
}

impl PolicyCheck {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Validates amounts against per-asset limits and mints transfer intents.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    eth: AssetPolicy,
    pyusd: AssetPolicy,
    ttl: Duration,
    chain_id: u64,
}

impl PolicyEngine {
    pub fn new(policies: &PolicyConfig, chain_id: u64) -> Self {
        Self {
            eth: AssetPolicy {
                max_tx_amount: policies.eth_max_tx_amount,
                daily_cap: policies.eth_daily_cap,
            },
            pyusd: AssetPolicy {
                max_tx_amount: policies.pyusd_max_tx_amount,
                daily_cap: policies.pyusd_daily_cap,
            },
            ttl: Duration::minutes(policies.expiry_minutes),
            chain_id,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.policies, config.chain_id)
    }

    /// Limits applying to the given asset.
    pub fn policy_for(&self, asset: Asset) -> AssetPolicy {
        match asset {
            Asset::Eth => self.eth,
            Asset::Pyusd => self.pyusd,
        }
    }

    /// How long a freshly built intent stays executable.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Validate a requested amount against the asset's limits.
    ///
    /// `current_daily_spend` is the sender's settled total for the asset on
    /// the current calendar day. Rules are additive, never short-circuited.
    pub fn validate(&self, amount: f64, current_daily_spend: f64, asset: Asset) -> PolicyCheck {
        let policy = self.policy_for(asset);
        let mut violations = Vec::new();

        if amount > policy.max_tx_amount {
            violations.push(format!(
                "Transaction amount exceeds maximum of {} {} per transaction",
                policy.max_tx_amount, asset
            ));
        }

        if current_daily_spend + amount > policy.daily_cap {
            violations.push(format!(
                "Transaction would exceed daily cap of {} {}. Current spending: {} {}",
                policy.daily_cap, asset, current_daily_spend, asset
            ));
        }

        PolicyCheck { violations }
    }

    /// Mint a fresh transfer intent in `pending` state with a v4 id and an
    /// expiry of now plus the configured TTL.
    pub fn build_intent(
        &self,
        sender: EmailAddress,
        recipient: EmailAddress,
        amount: f64,
        asset: Asset,
    ) -> TransferIntent {
        let now = Utc::now();
        TransferIntent {
            intent_id: Uuid::new_v4().to_string(),
            sender,
            recipient,
            amount,
            asset,
            chain_id: self.chain_id,
            created_at: now,
            expires_at: now + self.ttl,
            status: IntentStatus::Pending,
            receipt: None,
            failure_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(
            &PolicyConfig {
                pyusd_max_tx_amount: 100.0,
                pyusd_daily_cap: 500.0,
                eth_max_tx_amount: 0.1,
                eth_daily_cap: 0.5,
                expiry_minutes: 30,
            },
            11_155_111,
        )
    }

    fn email(raw: &str) -> EmailAddress {
        EmailAddress::parse(raw).unwrap()
    }

    #[test]
    fn within_limits_passes() {
        let check = engine().validate(50.0, 100.0, Asset::Pyusd);
        assert!(check.is_valid());
        assert!(check.violations.is_empty());
    }

    #[test]
    fn violation_count_matches_breached_rules() {
        let engine = engine();

        // Only the per-transaction max breached.
        let check = engine.validate(150.0, 0.0, Asset::Pyusd);
        assert_eq!(check.violations.len(), 1);
        assert!(check.violations[0].contains("maximum of 100 PYUSD"));

        // Only the daily cap breached.
        let check = engine.validate(50.0, 480.0, Asset::Pyusd);
        assert_eq!(check.violations.len(), 1);
        assert!(check.violations[0].contains("daily cap of 500 PYUSD"));

        // Both breached, both reported.
        let check = engine.validate(150.0, 480.0, Asset::Pyusd);
        assert_eq!(check.violations.len(), 2);
    }

    #[test]
    fn boundaries_are_inclusive() {
        let engine = engine();

        // Exactly the per-transaction max is allowed.
        assert!(engine.validate(100.0, 0.0, Asset::Pyusd).is_valid());

        // Landing exactly on the cap is allowed; one cent past is not.
        let spend = 400.0;
        assert!(engine.validate(500.0 - spend, spend, Asset::Pyusd).is_valid());
        assert!(!engine
            .validate(500.0 - spend + 0.01, spend, Asset::Pyusd)
            .is_valid());
    }

    #[test]
    fn eth_limits_are_distinct() {
        let engine = engine();
        assert!(engine.validate(0.1, 0.0, Asset::Eth).is_valid());
        assert!(!engine.validate(0.2, 0.0, Asset::Eth).is_valid());
        assert!(!engine.validate(0.1, 0.45, Asset::Eth).is_valid());
    }

    #[test]
    fn build_intent_stamps_fresh_pending_state() {
        let engine = engine();
        let before = Utc::now();
        let intent = engine.build_intent(email("a@b.co"), email("c@d.co"), 10.0, Asset::Pyusd);

        assert_eq!(intent.status, IntentStatus::Pending);
        assert_eq!(intent.chain_id, 11_155_111);
        assert_eq!(intent.amount, 10.0);
        assert!(intent.receipt.is_none());
        assert!(intent.created_at >= before);
        assert_eq!(intent.expires_at - intent.created_at, Duration::minutes(30));

        // Fresh unique id each time.
        let other = engine.build_intent(email("a@b.co"), email("c@d.co"), 10.0, Asset::Pyusd);
        assert_ne!(intent.intent_id, other.intent_id);
    }
}
